use iridium_stomp_client::{ConnectOptions, Connection, ConnectionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // This example expects a STOMP broker on localhost:61613 (e.g. RabbitMQ with stomp plugin).

    let conn = Connection::open(ConnectionConfig::default()).await?;
    conn.connect(ConnectOptions::new().host("/").credentials("guest", "guest"))
        .await?;

    // Begin a transaction
    let tx_id = "tx-example-1";
    conn.begin(tx_id).await?;
    println!("Transaction {} started", tx_id);

    // Send messages within the transaction
    for body in ["message 1 in transaction", "message 2 in transaction"] {
        conn.send_with_headers("/queue/test", body, [("transaction", tx_id)])
            .await?;
        println!("Sent '{}'", body);
    }

    // Commit the transaction (both messages will be delivered atomically)
    conn.commit(tx_id).await?;
    println!("Transaction {} committed", tx_id);

    // Example of aborting a transaction
    let tx_id_2 = "tx-example-2";
    conn.begin(tx_id_2).await?;
    println!("\nTransaction {} started", tx_id_2);

    conn.send_with_headers(
        "/queue/test",
        "this message will be aborted",
        [("transaction", tx_id_2)],
    )
    .await?;

    // Abort the transaction (message will not be delivered)
    conn.abort(tx_id_2).await?;
    println!("Transaction {} aborted", tx_id_2);

    conn.disconnect().await?;
    Ok(())
}
