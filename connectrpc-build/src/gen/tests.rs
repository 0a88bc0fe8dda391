use super::AxumConnectServiceGenerator;
use prost_build::{Method, Service, ServiceGenerator};

fn hello_world_service() -> Service {
    Service {
        name: "HelloWorldService".to_string(),
        proto_name: "HelloWorldService".to_string(),
        package: "hello".to_string(),
        comments: Default::default(),
        methods: vec![Method {
            name: "SayHello".to_string(),
            proto_name: "SayHello".to_string(),
            comments: Default::default(),
            input_type: ".hello.HelloRequest".to_string(),
            output_type: ".hello.HelloResponse".to_string(),
            input_proto_type: "HelloRequest".to_string(),
            output_proto_type: "HelloResponse".to_string(),
            options: Default::default(),
            client_streaming: false,
            server_streaming: false,
        }],
        options: Default::default(),
    }
}

#[test]
fn generates_connect_handler_builder() {
    let mut generator = AxumConnectServiceGenerator::new(true, false);
    let mut buf = String::new();
    generator.generate(hello_world_service(), &mut buf);

    assert!(
        buf.contains("HelloWorldServiceBuilder"),
        "Should contain HelloWorldServiceBuilder"
    );
    assert!(buf.contains("say_hello"), "Should contain say_hello method");
    assert!(
        buf.contains("ConnectHandlerWrapper"),
        "Should contain ConnectHandlerWrapper for unary methods"
    );
    assert!(
        !buf.contains("Client"),
        "Should not emit client code when client generation is disabled"
    );
}

#[test]
fn no_handlers_skips_router_builder() {
    let mut generator = AxumConnectServiceGenerator::new(false, false);
    let mut buf = String::new();
    generator.generate(hello_world_service(), &mut buf);

    assert!(
        buf.is_empty(),
        "Should generate nothing when both handlers and client are disabled"
    );
}

#[test]
fn generates_connect_client_alongside_handlers() {
    let mut generator = AxumConnectServiceGenerator::new(true, true);
    let mut buf = String::new();
    generator.generate(hello_world_service(), &mut buf);

    assert!(buf.contains("HelloWorldServiceBuilder"));
    assert!(
        buf.contains("HelloWorldServiceClient"),
        "Should contain the generated client struct"
    );
}
