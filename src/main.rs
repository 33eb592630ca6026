//! airdesk CLI：航空客服路由的交互式 REPL
//!
//! 每行输入走一次完整路由（或 --bypass 直接自由生成），打印回复与路由元数据。
//! 空行忽略；`/clear` 清空当前会话；`/quit` 或 EOF 退出。

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use airdesk::agent::build_orchestrator;
use airdesk::config::load_config;
use airdesk::core::{AgentResponse, ThresholdOverrides};
use airdesk::handlers::AgentContext;

#[derive(Parser)]
#[command(name = "airdesk", version, about = "Airline customer-service task router")]
struct Cli {
    /// Extra config file layered over config/default.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session key used for conversation memory.
    #[arg(long, default_value = "cli")]
    session: String,

    /// Customer name passed to the handlers.
    #[arg(long)]
    customer: Option<String>,

    /// Skip classification and answer with free-form generation.
    #[arg(long)]
    bypass: bool,

    /// Override the execute threshold for every request.
    #[arg(long)]
    execute_threshold: Option<f64>,

    /// Override the clarify threshold for every request.
    #[arg(long)]
    clarify_threshold: Option<f64>,
}

fn print_response(response: &AgentResponse) {
    println!("\n{}\n", response.answer);
    let entities: Vec<String> = response
        .entities
        .iter()
        .map(|e| format!("{}={}", e.entity_type(), e.value()))
        .collect();
    println!(
        "  [routed_to={} confidence={:.2} rewritten=\"{}\" entities=[{}]]\n",
        response.routed_to,
        response.confidence,
        response.rewritten_input,
        entities.join(", ")
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    airdesk::observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let orchestrator = build_orchestrator(&cfg).context("Failed to build orchestrator")?;

    let overrides = ThresholdOverrides {
        clarify: cli.clarify_threshold,
        execute: cli.execute_threshold,
    };
    let context = AgentContext::for_customer(
        cli.customer
            .clone()
            .unwrap_or_else(|| cfg.app.default_customer_name.clone()),
    );
    let ttl = cfg.session_ttl();

    println!("{} ready (session: {}). Type /quit to exit.", cfg.app.name, cli.session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                orchestrator.clear_session(&cli.session).await;
                println!("Session cleared.");
                continue;
            }
            _ => {}
        }

        let response = if cli.bypass {
            match orchestrator.process_bypass(input).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "bypass failed");
                    AgentResponse::error(input, &e)
                }
            }
        } else {
            orchestrator.handle(&cli.session, input, &context, overrides).await
        };
        print_response(&response);

        orchestrator.evict_idle(ttl).await;
    }

    Ok(())
}
