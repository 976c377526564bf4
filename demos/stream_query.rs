//! ksqlDB client example
//!
//! Runs a few statements with request/response logging, then streams a push
//! query for six seconds while a background task inserts rows.
//!
//! Run with: cargo run --example stream_query -- http://localhost:8088

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ksqldb_http::{ClientOptions, ClientTrace, KsqlClient, PreparedRequest, Resource, Scope};
use tokio::sync::Notify;

const STATEMENTS: &[&str] = &[
    "CREATE STREAM transactions (
        accountID BIGINT,
        marketID  BIGINT,
        amount    BIGINT,
        unit      VARCHAR
    ) WITH (
        KAFKA_TOPIC  = 'transactions',
        VALUE_FORMAT = 'JSON',
        PARTITIONS   = 1
    );",
    "SHOW STREAMS;",
];

fn log_request(req: &PreparedRequest) {
    println!("\n> {} {}", req.method(), req.url());
    for (name, value) in req.headers() {
        println!("> {}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    println!(">\n> {}", String::from_utf8_lossy(req.body()));
}

fn squash(statement: &str) -> String {
    statement.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8088".to_string());

    println!("ksqlDB Client Example");
    println!("=====================\n");

    let trace = ClientTrace::new()
        .on_request_prepared(log_request)
        .on_response_delivered(|res| match res {
            Ok(head) => println!("\n< {:?} {}", head.version, head.status),
            Err(e) => println!("\n< {e}"),
        })
        .with_connection_verbose(true);
    let client = KsqlClient::new(ClientOptions::new(url.clone()).with_trace(trace))
        .context("creating client")?;

    for statement in STATEMENTS {
        let response = client.execute(&Resource::statement(squash(statement))).await?;
        let (body, result) = response.read_all().await;
        result?;
        println!("{}", String::from_utf8_lossy(&body));
    }

    println!("\n> STREAMING EXAMPLE:");
    let scope = Scope::background().with_timeout(Duration::from_secs(6));
    let client = KsqlClient::new(ClientOptions::new(url).with_scope(scope))?;

    let opened = Arc::new(Notify::new());
    let inserter = {
        let client = client.clone();
        let opened = Arc::clone(&opened);
        tokio::spawn(async move {
            opened.notified().await;
            for i in 1..=3 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let insert = Resource::statement(format!(
                    "INSERT INTO transactions (accountID, marketID, amount, unit) \
                     VALUES (456, 22210, {i}, 'USD');"
                ));
                let (_, result) = client.execute(&insert).await?.read_all().await;
                result?;
            }
            anyhow::Ok(())
        })
    };

    let response = client
        .execute(&Resource::query("SELECT * FROM transactions EMIT CHANGES;"))
        .await?;
    opened.notify_one();

    let result = response
        .read_streaming(|row| {
            println!("<< {}", String::from_utf8_lossy(&row));
            Ok(())
        })
        .await;
    match result {
        Err(e) if e.is_canceled() => println!("\nDone."),
        other => other?,
    }

    // The inserter shares the expired scope; its late failures are expected.
    if let Ok(Err(e)) = inserter.await {
        tracing::debug!(error = %e, "inserter stopped");
    }
    Ok(())
}
