use async_trait::async_trait;
use farmdesk_core::config::ProcessConfig;
use log::{debug, error, info, warn};
use std::io::{Error, ErrorKind};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Launches the external node and farmer executables.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn start_node(&self, path: &str, node_name: &str) -> Result<(), Error>;
    async fn start_farming(
        &self,
        path: &str,
        reward_address: &str,
        plot_size_bytes: u64,
    ) -> Result<(), Error>;
    async fn shutdown(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone, Default)]
pub struct LaunchParams<'a> {
    pub path: &'a str,
    pub node_name: &'a str,
    pub reward_address: &'a str,
    pub plot_size: Option<u64>,
}

pub fn render_args(template: &[String], params: &LaunchParams) -> Vec<String> {
    let plot_size = params.plot_size.map(|s| s.to_string()).unwrap_or_default();
    template
        .iter()
        .map(|arg| {
            arg.replace("{path}", params.path)
                .replace("{node_name}", params.node_name)
                .replace("{reward_address}", params.reward_address)
                .replace("{plot_size}", &plot_size)
        })
        .collect()
}

fn forward_output<R: AsyncRead + Unpin + Send + 'static>(
    name: &'static str,
    stream: R,
    is_err: bool,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if is_err => warn!("[{name}] {line}"),
                Ok(Some(line)) => info!("[{name}] {line}"),
                Ok(None) => break,
                Err(e) => {
                    debug!("[{name}] output closed: {e}");
                    break;
                }
            }
        }
    });
}

/// Spawns the configured binaries as child processes and forwards their output to the log.
pub struct BinaryLauncher {
    node: ProcessConfig,
    farmer: ProcessConfig,
    children: Mutex<Vec<(&'static str, Child)>>,
}
impl BinaryLauncher {
    pub fn new(node: ProcessConfig, farmer: ProcessConfig) -> Self {
        Self {
            node,
            farmer,
            children: Mutex::new(vec![]),
        }
    }

    async fn spawn(
        &self,
        name: &'static str,
        config: &ProcessConfig,
        params: &LaunchParams<'_>,
    ) -> Result<(), Error> {
        if config.binary.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("No binary configured for {name}"),
            ));
        }
        let args = render_args(&config.args, params);
        info!("Starting {name}: {} {}", config.binary, args.join(" "));
        let mut child = Command::new(&config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::new(
                    e.kind(),
                    format!("Failed to start {name} ({}): {e}", config.binary),
                )
            })?;
        if let Some(stdout) = child.stdout.take() {
            forward_output(name, stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(name, stderr, true);
        }
        self.children.lock().await.push((name, child));
        Ok(())
    }

    pub async fn running(&self) -> usize {
        let mut children = self.children.lock().await;
        children.retain_mut(|(name, child)| match child.try_wait() {
            Ok(Some(status)) => {
                warn!("{name} exited with {status}");
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!("Failed to poll {name}: {e}");
                false
            }
        });
        children.len()
    }
}

#[async_trait]
impl ProcessLauncher for BinaryLauncher {
    async fn start_node(&self, path: &str, node_name: &str) -> Result<(), Error> {
        let params = LaunchParams {
            path,
            node_name,
            ..Default::default()
        };
        self.spawn("node", &self.node, &params).await
    }

    async fn start_farming(
        &self,
        path: &str,
        reward_address: &str,
        plot_size_bytes: u64,
    ) -> Result<(), Error> {
        let params = LaunchParams {
            path,
            reward_address,
            plot_size: Some(plot_size_bytes),
            ..Default::default()
        };
        self.spawn("farmer", &self.farmer, &params).await
    }

    async fn shutdown(&self) -> Result<(), Error> {
        let mut children = self.children.lock().await;
        let mut last_err = None;
        // farmer first, it depends on the node
        while let Some((name, mut child)) = children.pop() {
            info!("Stopping {name}");
            if let Err(e) = child.kill().await {
                error!("Failed to stop {name}: {e}");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
