use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};

use log::{debug, info};
use url::Url;

use crate::cancellation::CancellationToken;
use crate::dial::{self, AlwaysConfirm, GeminiStream, TofuPrompt};
use crate::dispatch::{Dispatcher, LineKind};
use crate::error::{GeminiClientError, Result};
use crate::gemtext::Node;
use crate::params::Params;
use crate::resolve as resolver;

const DEFAULT_REDIRECT_BUDGET: u32 = 0;
const MAX_META_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    None,
    Open,
    Closed,
}

/// Owns one capsule connection's lifecycle: dial (with redirect chaining),
/// Gemtext dispatch, and close.
///
/// `dial` hands the caller a `BufReader` over the response body, the way
/// the source returns a `*bufio.Reader`; `Control` separately keeps a
/// shutdown handle to the same socket so `close()` can tear it down even
/// after the reader has left its hands (§8 scenario 10).
pub struct Control {
    dispatcher: Dispatcher,
    cancellation: CancellationToken,
    prompt: Box<dyn TofuPrompt>,
    redirect_budget: u32,
    state: ConnectionState,
    shutdown_handle: Option<TcpStream>,
}

impl Control {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            dispatcher: Dispatcher::with_default_rewriters(),
            cancellation,
            prompt: Box::new(AlwaysConfirm),
            redirect_budget: DEFAULT_REDIRECT_BUDGET,
            state: ConnectionState::None,
            shutdown_handle: None,
        }
    }

    pub fn with_redirect_budget(mut self, budget: u32) -> Self {
        self.redirect_budget = budget;
        self
    }

    pub fn with_prompt(mut self, prompt: Box<dyn TofuPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Registers or replaces the rewriter for a line kind.
    pub fn attach(&self, kind: LineKind, f: impl Fn(&Node) -> String + Send + Sync + 'static) {
        self.dispatcher.attach(kind, f);
    }

    /// Dials `url`, following redirects up to the configured budget, and
    /// returns a reader positioned at the start of the successful
    /// response's body.
    pub fn dial(&mut self, url: &Url, params: &dyn Params) -> Result<BufReader<GeminiStream>> {
        self.dial_with_budget(url, params, self.redirect_budget)
    }

    fn dial_with_budget(
        &mut self,
        url: &Url,
        params: &dyn Params,
        budget: u32,
    ) -> Result<BufReader<GeminiStream>> {
        if self.cancellation.is_cancelled() || self.state == ConnectionState::Closed {
            return Err(GeminiClientError::Closed);
        }

        info!("dialing {url}");
        let stream = dial::dial(url, params, self.prompt.as_ref())?;
        let mut reader = BufReader::new(stream);

        reader.get_mut().write_all(format!("{url}\r\n").as_bytes())?;

        let mut header_line = String::new();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(GeminiClientError::Header("failed to read response".to_string()));
        }

        let mut fields = header_line.split_whitespace();
        let status_field = fields
            .next()
            .ok_or_else(|| GeminiClientError::Header("empty response header".to_string()))?;
        let status_char = status_field
            .chars()
            .next()
            .ok_or_else(|| GeminiClientError::Header("empty status field".to_string()))?;
        let status_class = status_char
            .to_digit(10)
            .ok_or_else(|| GeminiClientError::Header(format!("non-numeric status field {status_field:?}")))?
            as u8;
        let meta = fields.next().unwrap_or("").to_string();
        if meta.len() > MAX_META_LEN {
            return Err(GeminiClientError::Header("meta field exceeds 1024 bytes".to_string()));
        }

        match status_class {
            1 | 6 => Err(GeminiClientError::Unsupported(format!("status {status_class}"))),
            2 => {
                self.shutdown_handle = reader.get_ref().sock.try_clone().ok();
                self.state = ConnectionState::Open;
                Ok(reader)
            }
            3 => {
                debug!("redirecting to {meta}");
                if meta.is_empty() {
                    return Err(GeminiClientError::Redirect("missing redirect target".to_string()));
                }
                if budget == 0 {
                    return Err(GeminiClientError::Redirect("redirect budget exhausted".to_string()));
                }
                let next = resolver::resolve(&meta, url.as_str())?;
                // Drop the current stream before redialing; its socket
                // closes on drop the way `preRedirect` closes `c.conn`.
                drop(reader);
                self.dial_with_budget(&next, params, budget - 1)
            }
            4 | 5 => Err(GeminiClientError::Remote {
                status: status_class,
                meta,
            }),
            _ => Err(GeminiClientError::Unsupported(format!(
                "exceptional status {status_class}"
            ))),
        }
    }

    /// Reads the entire body from `reader` and dispatches it through the
    /// registered rewriters.
    pub fn retrieve(&self, mut reader: impl BufRead) -> Result<String> {
        use std::io::Read;
        if self.state == ConnectionState::Closed {
            return Err(GeminiClientError::Closed);
        }
        let mut body = String::new();
        reader.read_to_string(&mut body)?;
        self.dispatcher.retrieve(body)
    }

    /// Idempotent: the first call shuts down the socket underlying the most
    /// recent successful `dial` (if any), drops every rewriter channel, and
    /// cancels the shared token so any party still holding it observes the
    /// close.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            self.cancellation.cancel();
            if let Some(handle) = self.shutdown_handle.take() {
                let _ = handle.shutdown(Shutdown::Both);
            }
        }
        self.dispatcher.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::TrustMask;
    use crate::params::{Params, StaticParams};

    #[test]
    fn close_before_any_dial_is_a_no_op() {
        let mut control = Control::new(CancellationToken::new());
        control.close();
        control.close();
    }

    #[test]
    fn redirect_budget_of_zero_fails_fast_without_network() {
        // A redirect only ever gets evaluated after a successful connect;
        // this just documents the budget-exhaustion error path shape.
        let err = GeminiClientError::Redirect("redirect budget exhausted".to_string());
        assert!(matches!(err, GeminiClientError::Redirect(_)));
    }

    #[test]
    fn params_known_hosts_path_is_used_verbatim() {
        let params = StaticParams::new(TrustMask::NONE, "/tmp/nonexistent-known-hosts-for-test");
        assert_eq!(
            params.known_hosts(),
            std::path::PathBuf::from("/tmp/nonexistent-known-hosts-for-test")
        );
    }
}
