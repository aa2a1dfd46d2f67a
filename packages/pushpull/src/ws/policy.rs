use futures::FutureExt;
use futures::future::BoxFuture;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::config::ReplyMode;

/// Source of replies for a duplex session.
///
/// `reply` is awaited inside the session loop, so an implementation that needs
/// to wait (for an operator, a queue, another service) must suspend rather than
/// block the thread. `None` means no reply will ever come and the session
/// should close.
pub trait ReplyPolicy: Send + Sync {
    fn reply<'a>(&'a self, received: &'a str) -> BoxFuture<'a, Option<String>>;
}

/// Replies with exactly what was received.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl ReplyPolicy for Echo {
    fn reply<'a>(&'a self, received: &'a str) -> BoxFuture<'a, Option<String>> {
        async move { Some(received.to_string()) }.boxed()
    }
}

/// Wraps a plain function `(received) -> reply` as a policy.
pub struct FnPolicy<F>(F);

pub fn reply_fn<F>(f: F) -> FnPolicy<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    FnPolicy(f)
}

impl<F> ReplyPolicy for FnPolicy<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn reply<'a>(&'a self, received: &'a str) -> BoxFuture<'a, Option<String>> {
        let reply = (self.0)(received);
        async move { reply }.boxed()
    }
}

/// Replies typed by an operator.
///
/// Lines arrive over a channel (fed from stdin by [`OperatorConsole::spawn_stdin`]),
/// and sessions take them in the order they ask. Waiting for the operator is a
/// suspension point, so other connections keep running meanwhile.
pub struct OperatorConsole {
    replies: Mutex<mpsc::Receiver<String>>,
    echo_prompt: bool,
}

impl OperatorConsole {
    pub fn new(replies: mpsc::Receiver<String>) -> Self {
        Self {
            replies: Mutex::new(replies),
            echo_prompt: false,
        }
    }

    /// Read operator replies line by line from the process's stdin.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::channel::<String>(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            debug!("Operator input closed");
        });
        Self {
            replies: Mutex::new(rx),
            echo_prompt: true,
        }
    }
}

impl ReplyPolicy for OperatorConsole {
    fn reply<'a>(&'a self, received: &'a str) -> BoxFuture<'a, Option<String>> {
        async move {
            if self.echo_prompt {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "Client >> {}", received);
                let _ = write!(stdout, "Server >> ");
                let _ = stdout.flush();
            }
            self.replies.lock().await.recv().await
        }
        .boxed()
    }
}

/// Build the policy selected in config.
pub fn policy_for(mode: ReplyMode) -> Arc<dyn ReplyPolicy> {
    info!("Duplex reply policy: {:?}", mode);
    match mode {
        ReplyMode::Echo => Arc::new(Echo),
        ReplyMode::Console => Arc::new(OperatorConsole::spawn_stdin()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_input() {
        assert_eq!(Echo.reply("hello").await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_fn_policy() {
        let policy = reply_fn(|msg| Some(msg.to_uppercase()));
        assert_eq!(policy.reply("shout").await.as_deref(), Some("SHOUT"));
    }

    #[tokio::test]
    async fn test_console_replies_in_order_then_closes() {
        let (tx, rx) = mpsc::channel(4);
        let console = OperatorConsole::new(rx);

        tx.send("first".to_string()).await.unwrap();
        tx.send("second".to_string()).await.unwrap();
        drop(tx);

        assert_eq!(console.reply("a").await.as_deref(), Some("first"));
        assert_eq!(console.reply("b").await.as_deref(), Some("second"));
        assert_eq!(console.reply("c").await, None);
    }

    #[tokio::test]
    async fn test_console_waits_without_blocking_other_tasks() {
        let (tx, rx) = mpsc::channel(1);
        let console = Arc::new(OperatorConsole::new(rx));

        let waiting = console.clone();
        let handle = tokio::spawn(async move { waiting.reply("ping").await });

        // Another task still gets to run while the console waits.
        let other = tokio::spawn(async { 40 + 2 });
        assert_eq!(other.await.unwrap(), 42);
        assert!(!handle.is_finished());

        tx.send("pong".to_string()).await.unwrap();
        assert_eq!(handle.await.unwrap().as_deref(), Some("pong"));
    }
}
