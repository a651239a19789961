use anyhow::Context;
use serde::{Deserialize, Serialize};
use tether::{Dispatcher, DispatcherConfig, Job, SocketTransport};

use crate::cli::ReplayArgs;
use crate::error::CliResult;

/// A captured request whose schema is only known to the worker
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
struct ReplayJob {
    #[serde(skip)]
    type_tag: u32,
    #[serde(skip)]
    task: String,
    body: serde_json::Value,
}

impl Job for ReplayJob {
    type Response = serde_json::Value;

    fn type_tag(&self) -> u32 {
        self.type_tag
    }

    fn name(&self) -> String {
        self.task.clone()
    }
}

pub fn execute(args: ReplayArgs, socket: &std::path::Path, config: DispatcherConfig) -> CliResult<()> {
    let content = std::fs::read(&args.request)
        .with_context(|| format!("failed to read request: {}", args.request.display()))?;
    let body: serde_json::Value = serde_json::from_slice(&content)
        .with_context(|| format!("failed to parse request: {}", args.request.display()))?;

    let job = ReplayJob {
        type_tag: args.type_tag,
        task: args.task,
        body,
    };

    let transport = SocketTransport::connect(socket)
        .with_context(|| format!("failed to connect to worker at {}", socket.display()))?;
    let dispatcher = Dispatcher::with_config(transport, config);

    let response = dispatcher.run_job(&job, dispatcher.config().default_timeout(), None)?;
    let text = serde_json::to_string_pretty(&response).context("failed to format response")?;

    if let Some(path) = &args.response {
        std::fs::write(path, &text)
            .with_context(|| format!("failed to write response: {}", path.display()))?;
        tracing::info!(path = %path.display(), "job response written");
    }

    println!("{text}");
    Ok(())
}
