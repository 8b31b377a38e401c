use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use super::ChatSurface;
use crate::error::TransportError;

const PROMPT: &str = "› ";
const EXIT_COMMANDS: &[&str] = &["exit", "quit", ":q"];

/// Line-oriented chat over stdin/stdout
pub struct TerminalSurface<R = BufReader<Stdin>, W = Stdout> {
    lines: Lines<R>,
    output: W,
}

impl TerminalSurface {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalSurface<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[async_trait]
impl<R, W> ChatSurface for TerminalSurface<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        self.output.write_all(PROMPT.as_bytes()).await?;
        self.output.flush().await?;

        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };
        let line = line.trim();
        if EXIT_COMMANDS.contains(&line) {
            return Ok(None);
        }
        Ok(Some(line.to_string()))
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_trims_and_stops_on_exit() {
        let input: &[u8] = b"  list namespaces  \nexit\nnever read\n";
        let mut surface = TerminalSurface::new(input, Vec::new());

        assert_eq!(surface.receive().await.unwrap().as_deref(), Some("list namespaces"));
        assert_eq!(surface.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eof_is_disconnect() {
        let input: &[u8] = b"";
        let mut surface = TerminalSurface::new(input, Vec::new());
        assert_eq!(surface.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_writes_reply_block() {
        let input: &[u8] = b"";
        let mut surface = TerminalSurface::new(input, Vec::new());
        surface.send("Hello, world!").await.unwrap();
        assert_eq!(surface.into_output(), b"Hello, world!\n\n");
    }
}
