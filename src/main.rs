use ben_or_node::config::Args;
use ben_or_node::control::router;
use ben_or_node::node::Node;
use ben_or_node::readiness::NoopBarrier;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let node = if args.faulty {
        Node::new_faulty(args.node_id)
    } else {
        Node::new_participant(
            args.node_id,
            args.n,
            args.f,
            args.initial_value,
            args.base_port,
            Arc::new(NoopBarrier),
        )
    };
    let node = Arc::new(node);

    let app = router(node);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.base_port + args.node_id as u16));

    info!(%addr, node_id = args.node_id, n = args.n, f = args.f, "starting node");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("server error");
}
