use r#gen::AxumConnectServiceGenerator;
use std::io::Result;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Code generation module for service builders.
mod r#gen;

// ============================================================================
// Type-state marker types for phantom data
// ============================================================================

/// Marker indicating a feature is enabled.
pub struct Enabled;

/// Marker indicating a feature is disabled.
pub struct Disabled;

/// Trait to convert type markers to runtime booleans.
pub trait BuildMarker {
    /// The boolean value this marker represents.
    const VALUE: bool;
}

impl BuildMarker for Enabled {
    const VALUE: bool = true;
}

impl BuildMarker for Disabled {
    const VALUE: bool = false;
}

/// Builder for compiling proto files with optional configuration.
///
/// Type parameters control code generation:
/// - `Connect`: Whether to generate Connect service handler builders
/// - `Client`: Whether to generate Connect client stubs
///
/// Default state is `CompileBuilder<Enabled, Disabled>` (server handler builders only).
pub struct CompileBuilder<Connect = Enabled, Client = Disabled> {
    includes_dir: PathBuf,
    prost_config: Option<Box<dyn FnOnce(&mut prost_build::Config)>>,
    _marker: PhantomData<(Connect, Client)>,
}

// ============================================================================
// Methods available when Connect = Enabled
// ============================================================================

impl<Cl> CompileBuilder<Enabled, Cl> {
    /// Skip generating Connect service handler builders.
    ///
    /// When called, only message types and serde implementations are generated.
    /// No Connect service builders (e.g., `HelloWorldServiceBuilder`) will be created.
    ///
    /// Use this when you only need protobuf message types with JSON serialization support.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     connectrpc_build::compile_dir("proto")
    ///         .no_handlers()  // Only generate message types + serde
    ///         .compile()?;
    ///     Ok(())
    /// }
    /// ```
    pub fn no_handlers(self) -> CompileBuilder<Disabled, Cl> {
        CompileBuilder {
            includes_dir: self.includes_dir,
            prost_config: self.prost_config,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Methods available on all builder states
// ============================================================================

impl<C, Cl> CompileBuilder<C, Cl> {
    /// Fetch and configure the protoc compiler.
    ///
    /// Downloads the specified version of protoc and sets the `PROTOC` environment
    /// variable so that prost-build uses the downloaded binary.
    ///
    /// # Arguments
    ///
    /// * `version` - The protoc version to download. Defaults to "31.1" if `None`.
    /// * `path` - The directory to download protoc into. Defaults to `OUT_DIR` if `None`.
    #[cfg(feature = "fetch-protoc")]
    pub fn fetch_protoc(self, version: Option<&str>, path: Option<&Path>) -> Result<Self> {
        let version = version.unwrap_or("31.1");
        let out_dir = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let dir = std::env::var("OUT_DIR")
                    .map_err(|e| std::io::Error::other(format!("OUT_DIR not set: {e}")))?;
                PathBuf::from(dir)
            }
        };

        let protoc_path = protoc_fetcher::protoc(version, &out_dir)
            .map_err(|e| std::io::Error::other(format!("failed to fetch protoc: {e}")))?;

        // SAFETY: This is called from build.rs which runs single-threaded before compilation.
        // No other threads exist that could be reading environment variables concurrently.
        unsafe {
            std::env::set_var("PROTOC", protoc_path);
        }

        Ok(self)
    }

    /// Customize the prost builder with a configuration closure.
    ///
    /// The closure receives a mutable reference to `prost_build::Config` and is applied
    /// before the required internal configuration. Internal settings (like file descriptor
    /// set path) will be applied after and take precedence.
    ///
    /// Use this to add type attributes, extern paths, or other prost configuration.
    pub fn with_prost_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut prost_build::Config) + 'static,
    {
        self.prost_config = Some(Box::new(f));
        self
    }
}

// ============================================================================
// Methods available when Client = Disabled (enable client stub generation)
// ============================================================================

impl<C> CompileBuilder<C, Disabled> {
    /// Enable generating Connect client stubs alongside server handler builders.
    ///
    /// Client code is appended to the same `{package}.rs` file as the message types
    /// and (if enabled) the server handler builders.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     connectrpc_build::compile_dir("proto")
    ///         .with_client()
    ///         .compile()?;
    ///     Ok(())
    /// }
    /// ```
    pub fn with_client(self) -> CompileBuilder<C, Enabled> {
        CompileBuilder {
            includes_dir: self.includes_dir,
            prost_config: self.prost_config,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Compile method - available on all states with BuildMarker bounds
// ============================================================================

impl<C: BuildMarker, Cl: BuildMarker> CompileBuilder<C, Cl> {
    /// Execute code generation.
    pub fn compile(self) -> Result<()> {
        let generate_handlers = C::VALUE;
        let generate_client = Cl::VALUE;
        let out_dir = std::env::var("OUT_DIR")
            .map_err(|e| std::io::Error::other(format!("OUT_DIR not set: {e}")))?;
        let descriptor_path = format!("{}/descriptor.bin", out_dir);

        let mut config = prost_build::Config::default();

        // Apply user's prost configuration first
        if let Some(config_fn) = self.prost_config {
            config_fn(&mut config);
        }

        // Always generate descriptor set for pbjson-build (internal config takes precedence)
        config.file_descriptor_set_path(&descriptor_path);

        let mut proto_files = Vec::new();
        discover_proto_files(&self.includes_dir, &mut proto_files)?;
        if proto_files.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "No .proto files found in directory: {}",
                    self.includes_dir.display()
                ),
            ));
        }

        if generate_handlers || generate_client {
            let service_generator =
                AxumConnectServiceGenerator::new(generate_handlers, generate_client);
            config.service_generator(Box::new(service_generator));
        }
        config.compile_protos(&proto_files, &[&self.includes_dir])?;

        // pbjson-build generates the canonical protobuf JSON mapping (oneof-aware),
        // which replaces the derive(Serialize)/derive(Deserialize) prost would otherwise need.
        use std::fs;
        let descriptor_bytes = fs::read(&descriptor_path)
            .map_err(|e| std::io::Error::other(format!("read descriptor: {e}")))?;

        pbjson_build::Builder::new()
            .register_descriptors(&descriptor_bytes)
            .map_err(|e| std::io::Error::other(format!("register descriptors: {e}")))?
            .build(&["."])
            .map_err(|e| std::io::Error::other(format!("pbjson build: {e}")))?;

        // pbjson-build generates {package}.serde.rs files that need to be appended
        // to the main generated file.
        for entry in fs::read_dir(&out_dir)? {
            let entry = entry?;
            let path = entry.path();
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str())
                && file_name.ends_with(".serde.rs")
            {
                let base_name = file_name.strip_suffix(".serde.rs").unwrap();
                let main_file = format!("{}/{}.rs", out_dir, base_name);

                if std::path::Path::new(&main_file).exists() {
                    let mut content = fs::read_to_string(&main_file)?;
                    content.push_str("\n// --- pbjson serde implementations ---\n");
                    content.push_str(&fs::read_to_string(&path)?);
                    fs::write(&main_file, content)?;
                    let _ = fs::remove_file(&path);
                }
            }
        }

        let _ = std::fs::remove_file(&descriptor_path);

        Ok(())
    }
}

/// Convenience function that auto-discovers all .proto files in the includes directory
/// and compiles them with a default or custom configuration.
///
/// This provides the best developer experience by only requiring the includes path.
/// Use `.with_prost_config()` if you need custom configuration.
///
/// # Examples
///
/// Basic usage with default configuration:
/// ```rust,no_run
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     connectrpc_build::compile_dir("proto").compile()?;
///     Ok(())
/// }
/// ```
///
/// With custom configuration:
/// ```rust,no_run
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     connectrpc_build::compile_dir("proto")
///         .with_prost_config(|config| {
///             config.type_attribute(".", "#[derive(Debug)]");
///         })
///         .compile()?;
///     Ok(())
/// }
/// ```
///
/// With a generated client:
/// ```rust,no_run
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     connectrpc_build::compile_dir("proto")
///         .with_client()
///         .compile()?;
///     Ok(())
/// }
/// ```
pub fn compile_dir(includes_dir: impl AsRef<Path>) -> CompileBuilder {
    CompileBuilder {
        includes_dir: includes_dir.as_ref().to_path_buf(),
        prost_config: None,
        _marker: PhantomData,
    }
}

fn discover_proto_files(dir: &Path, proto_files: &mut Vec<std::path::PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        ));
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("proto") {
            proto_files.push(path);
        } else if path.is_dir() {
            discover_proto_files(&path, proto_files)?;
        }
    }

    Ok(())
}
