use clap::Parser;

use nsq_front::client::Publisher;
use nsq_front::observability::logging;

#[derive(Parser)]
#[command(name = "nsq-pub")]
#[command(about = "Publish messages to an nsq-front daemon", long_about = None)]
struct Cli {
    /// Daemon address.
    #[arg(short, long, default_value = "127.0.0.1:4150")]
    addr: String,

    /// Topic to publish to.
    #[arg(short, long)]
    topic: String,

    /// Read one message per line from stdin instead of MESSAGES.
    #[arg(long)]
    stdin: bool,

    /// Messages to publish, one frame each.
    messages: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("warn");
    let cli = Cli::parse();

    let messages = if cli.stdin {
        read_stdin_lines().await?
    } else {
        cli.messages
    };
    let messages = non_empty(messages)?;

    let mut publisher = Publisher::connect(&cli.addr).await?;
    for message in &messages {
        publisher.publish(&cli.topic, message.clone().into_bytes()).await?;
    }
    publisher.close().await?;

    println!("published {} message(s) to {}", messages.len(), cli.topic);
    Ok(())
}

fn non_empty(messages: Vec<String>) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if messages.is_empty() {
        return Err("nothing to publish".into());
    }
    Ok(messages)
}

async fn read_stdin_lines() -> std::io::Result<Vec<String>> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut messages = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if !line.is_empty() {
            messages.push(line);
        }
    }
    Ok(messages)
}
