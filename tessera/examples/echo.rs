//! Echo example for Tessera.
//!
//! Binds a TCP server on a loopback port, connects a client, and bounces
//! a few messages through it:
//! - a JSON message sent whole and cast lazily on the client
//! - a binary message decoded eagerly on a worker and sent back in slices
//!
//! Run with `RUST_LOG=debug cargo run --example echo` to see the frame traffic.

use std::sync::Arc;

use tessera::{
    Binary, ChannelConfig, Envelope, ErrorKind, Message, RecvFlags, Reflect, SendFlags, TcpClient,
    TcpServer, TcpServerConfig, TesseraError, TypeRegistry, Version,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Reflect, Message)]
#[message(name = "echo.Greeting")]
struct Greeting {
    name: String,
    count: u32,
}

#[derive(Debug, Default, Reflect, Message)]
#[message(name = "echo.Samples", format = Binary)]
struct Samples {
    label: String,
    values: Vec<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = TypeRegistry::with_version(Version::new(1, 0, 0));
    registry.register::<Greeting>()?;
    registry.register::<Samples>()?;
    let registry = Arc::new(registry);

    let config = ChannelConfig::new().slice_size(512);
    let server = TcpServer::bind(
        TcpServerConfig::new("127.0.0.1:0").channel(config.clone()),
        registry.clone(),
    )
    .await?;
    let addr = server.local_addr()?;
    println!("Echo server listening on {addr}");

    let echo = tokio::spawn(async move {
        let (channel, peer) = server.accept().await?;
        println!("  accepted {peer}");

        loop {
            let envelope = match channel
                .recv(RecvFlags::new().decode(true).offload(true))
                .await
            {
                Ok(envelope) => envelope,
                Err(e) if e.kind() == ErrorKind::TransportClosed => break,
                Err(e) => return Err(e),
            };
            println!("  echoing message {}", envelope.id());
            channel
                .send(envelope, SendFlags::new().slice(true).verify_version(true))
                .await?;
        }
        Ok::<_, TesseraError>(())
    });

    let client = TcpClient::new(registry.clone()).connect(addr).await?;

    let greeting = Greeting {
        name: "World".into(),
        count: 1,
    };
    client.send(Envelope::new(greeting), SendFlags::new()).await?;
    let mut reply = client.recv(RecvFlags::new()).await?;
    let greeting = reply.cast::<Greeting>(&registry)?;
    println!("Greeting back: {} x{}", greeting.name, greeting.count);

    let samples = Samples {
        label: "sine".into(),
        values: (0..1000).map(|i| (f64::from(i) * 0.01).sin()).collect(),
    };
    client
        .send(Envelope::new(samples), SendFlags::new().offload(true))
        .await?;
    let reply = client.recv(RecvFlags::new()).await?;
    let samples = reply.into_inner::<Samples>(&registry)?;
    println!(
        "Samples back: {} with {} values",
        samples.label,
        samples.values.len()
    );

    client.close().await?;
    echo.await??;

    println!("\nExample completed successfully!");
    Ok(())
}
