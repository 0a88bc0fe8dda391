//! Service builder for combining multiple Connect routers into one service.
//!
//! This module provides [`MakeServiceBuilder`], a convenient builder for combining
//! multiple Connect RPC routers into a single router with the default layers applied.
//!
//! # Examples
//!
//! ```rust,no_run
//! use connectrpc_server::MakeServiceBuilder;
//! # use axum::Router;
//! # let hello_router: Router<()> = Router::new();
//! # let user_router: Router<()> = Router::new();
//! # let team_router: Router<()> = Router::new();
//!
//! let app = MakeServiceBuilder::new()
//!     .add_router(hello_router)
//!     .add_routers(vec![user_router, team_router])
//!     .build();
//! ```

use axum::Router;

use crate::context::MessageLimits;
use crate::layer::ConnectLayer;

/// Builder for combining multiple Connect routers into a single service.
///
/// # Type Parameters
///
/// - `S`: The state type for the routers (default: `()`)
///
/// # Examples
///
/// ```rust,no_run
/// use connectrpc_server::MakeServiceBuilder;
/// # use axum::Router;
/// # let router1: Router<()> = Router::new();
/// # let router2: Router<()> = Router::new();
///
/// let app = MakeServiceBuilder::new()
///     .add_router(router1)
///     .add_router(router2)
///     .build();
/// ```
pub struct MakeServiceBuilder<S = ()> {
    connect_router: Router<S>,
    /// Message size limits for requests
    limits: MessageLimits,
    /// Whether to require the Connect-Protocol-Version header
    require_protocol_header: bool,
}

impl<S> Default for MakeServiceBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> MakeServiceBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Creates a new `MakeServiceBuilder`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use connectrpc_server::MakeServiceBuilder;
    ///
    /// let builder: MakeServiceBuilder<()> = MakeServiceBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            connect_router: Router::new(),
            limits: MessageLimits::default(),
            require_protocol_header: false,
        }
    }

    /// Set custom message size limits.
    ///
    /// Default is 4 MB.
    pub fn message_limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Require the `Connect-Protocol-Version` header on Connect protocol requests.
    ///
    /// When enabled, requests must include the `Connect-Protocol-Version: 1` header.
    /// This helps HTTP proxies and middleware identify valid Connect requests.
    ///
    /// Disabled by default to allow easy ad-hoc requests (e.g., with cURL).
    pub fn require_protocol_header(mut self, require: bool) -> Self {
        self.require_protocol_header = require;
        self
    }

    /// Adds a single Connect RPC router to the builder.
    ///
    /// The router will be merged with any previously added routers using
    /// [`Router::merge`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use connectrpc_server::MakeServiceBuilder;
    /// # use axum::Router;
    /// # let hello_router: Router<()> = Router::new();
    ///
    /// let builder = MakeServiceBuilder::new()
    ///     .add_router(hello_router);
    /// ```
    pub fn add_router(mut self, router: Router<S>) -> Self {
        self.connect_router = self.connect_router.merge(router);
        self
    }

    /// Adds multiple Connect RPC routers to the builder.
    ///
    /// All routers will be merged together using [`Router::merge`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use connectrpc_server::MakeServiceBuilder;
    /// # use axum::Router;
    /// # let router1: Router<()> = Router::new();
    /// # let router2: Router<()> = Router::new();
    /// # let router3: Router<()> = Router::new();
    ///
    /// let builder = MakeServiceBuilder::new()
    ///     .add_routers(vec![router1, router2, router3]);
    /// ```
    pub fn add_routers(mut self, routers: impl IntoIterator<Item = Router<S>>) -> Self {
        for router in routers {
            self.connect_router = self.connect_router.merge(router);
        }
        self
    }

    /// Builds the combined Connect RPC router.
    ///
    /// The router will have [`ConnectLayer`] applied with the configured
    /// message limits and protocol header requirements.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use connectrpc_server::MakeServiceBuilder;
    /// # use axum::Router;
    /// # let router1: Router<()> = Router::new();
    /// # let router2: Router<()> = Router::new();
    ///
    /// let app = MakeServiceBuilder::new()
    ///     .add_router(router1)
    ///     .add_router(router2)
    ///     .build();
    /// ```
    pub fn build(self) -> Router<S> {
        let layer = ConnectLayer::new()
            .limits(self.limits)
            .require_protocol_header(self.require_protocol_header);
        self.connect_router.layer(layer)
    }
}
