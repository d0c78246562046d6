use iridium_stomp_client::{ConnectOptions, Connection, ConnectionConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // This example expects a STOMP broker on localhost:61613 (e.g. RabbitMQ with stomp plugin).

    let config = ConnectionConfig::new("127.0.0.1", 61613)
        .with_response_timeout(Duration::from_secs(2));
    let conn = Connection::open(config).await?;

    let session = conn
        .connect(ConnectOptions::new().host("/").credentials("guest", "guest"))
        .await?;
    println!("connected: {:?}", session);

    let sub = conn
        .subscribe_with_headers("/queue/test", [("receipt", "quickstart-sub")])
        .await?;

    conn.send_with_headers(
        "/queue/test",
        "hello from iridium-stomp-client example",
        [("receipt", "quickstart-send")],
    )
    .await?;

    // Wait for the message to come back, but don't block forever.
    match sub.next_message_timeout(Duration::from_secs(5)).await {
        Some(frame) => println!("received frame:\n{}", frame),
        None => println!("timed out waiting for a message"),
    }

    conn.disconnect().await?;
    Ok(())
}
