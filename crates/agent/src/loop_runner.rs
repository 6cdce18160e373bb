//! The bounded tool loop.
//!
//! One user input runs at most `max_tool_iters` completion rounds. Each
//! round the model either answers plainly, in which case the answer goes
//! back to the user, or embeds a `<tool:NAME>ARGS</tool>` marker, in
//! which case the tool runs and its result is appended to the session as
//! the next user turn. Hitting the iteration cap delivers the last reply
//! as-is; the model does not get to spin forever.

use std::time::Duration;

use microclaw_config::Store;
use microclaw_core::{Error, SessionLog};
use microclaw_tools::{dispatch, NetStatus, ToolCtx};
use microclaw_transport::IdleNotify;
use tracing::{debug, info};

use crate::llm::LlmClient;

/// Standing instructions sent with every completion.
pub const SYSTEM_PROMPT: &str = "You are MicroClaw, a small assistant living on a \
microcontroller-class device. Keep replies short and plain; the output surface is a \
chat message or a serial console. To use a device tool, reply with exactly \
<tool:NAME>ARGS</tool> and nothing else. Tools: message (send text to the user \
immediately), get_network_info, get_uptime, set_config (key=value), get_config, \
reset_session.";

/// What one agent run produced.
#[derive(Debug)]
pub struct AgentOutcome {
    /// Final reply for the user.
    pub reply: String,
    /// Messages the `message` tool asked to deliver first.
    pub outbox: Vec<String>,
}

pub struct Agent {
    client: LlmClient,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent {
    pub fn new() -> Self {
        Self { client: LlmClient::new() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    /// Run `input` through the completion/tool loop.
    pub fn run(
        &mut self,
        input: &str,
        store: &mut Store,
        session: &mut SessionLog,
        net: &NetStatus,
        uptime: Duration,
        idle: &mut dyn IdleNotify,
    ) -> Result<AgentOutcome, Error> {
        session.push("user", input);
        let mut outbox = Vec::new();
        let max_iters = store.config.max_tool_iters.max(1);

        let mut reply = String::new();
        for iter in 0..max_iters {
            reply = self
                .client
                .chat(&store.config, SYSTEM_PROMPT, session, idle)?;
            session.push("assistant", &reply);

            let Some((tool, args)) = parse_tool_marker(&reply) else {
                debug!(iter, "final reply");
                return Ok(AgentOutcome { reply, outbox });
            };
            if iter + 1 == max_iters {
                break;
            }
            info!(tool, iter, "running tool");
            let mut ctx = ToolCtx::new(store, session, net, uptime);
            let result = dispatch(tool, args, &mut ctx);
            outbox.append(&mut ctx.outbox);
            session.push("user", &format!("[Tool {tool}]: {result}"));
        }
        // iteration cap reached, deliver whatever the model last said
        Ok(AgentOutcome { reply, outbox })
    }
}

/// `<tool:NAME>ARGS</tool>` anywhere in the reply. A missing close tag
/// takes the rest of the text as the arguments.
fn parse_tool_marker(reply: &str) -> Option<(&str, &str)> {
    let start = reply.find("<tool:")?;
    let after = &reply[start + 6..];
    let name_end = after.find('>')?;
    let name = &after[..name_end];
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let rest = &after[name_end + 1..];
    let args = match rest.find("</tool>") {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some((name, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{serve, Exchange};
    use microclaw_config::JsonStore;
    use microclaw_transport::NoopIdle;
    use tempfile::TempDir;

    fn completion(content: &str) -> Exchange {
        // keep the fixture honest: escape what a real server would
        let escaped = content.replace('\\', "\\\\").replace('"', "\\\"");
        Exchange::json(&format!(
            r#"{{"choices":[{{"message":{{"role":"assistant","content":"{escaped}"}}}}]}}"#
        ))
    }

    struct Fixture {
        _dir: TempDir,
        store: Store,
        session: SessionLog,
        net: NetStatus,
    }

    impl Fixture {
        fn new(port: u16) -> Self {
            let dir = TempDir::new().unwrap();
            let mut store =
                Store::open(Box::new(JsonStore::new(dir.path().join("config.json")))).unwrap();
            store.config.llm_api_base = format!("http://127.0.0.1:{port}");
            store.config.llm_api_key = "sk-test".to_string();
            Self {
                _dir: dir,
                store,
                session: SessionLog::new(),
                net: NetStatus::default(),
            }
        }

        fn run(&mut self, input: &str) -> AgentOutcome {
            Agent::new()
                .with_timeout(Duration::from_secs(5))
                .run(
                    input,
                    &mut self.store,
                    &mut self.session,
                    &self.net,
                    Duration::from_secs(10),
                    &mut NoopIdle,
                )
                .unwrap()
        }
    }

    #[test]
    fn plain_reply_passes_straight_through() {
        let (port, _server) = serve(vec![completion("hello from the model")]);
        let mut f = Fixture::new(port);
        let out = f.run("hi");
        assert_eq!(out.reply, "hello from the model");
        assert!(out.outbox.is_empty());

        let history: Vec<_> = f.session.entries().collect();
        assert_eq!(history[0], ("user", "hi"));
        assert_eq!(history[1], ("assistant", "hello from the model"));
    }

    #[test]
    fn tool_call_feeds_back_and_the_next_round_answers() {
        let (port, server) = serve(vec![
            completion("<tool:get_uptime></tool>"),
            completion("the device has been up 10 seconds"),
        ]);
        let mut f = Fixture::new(port);
        let out = f.run("how long have you been up?");
        assert_eq!(out.reply, "the device has been up 10 seconds");

        // the second request carries the tool result as a user turn
        let reqs = server.join().unwrap();
        assert!(reqs[1].body.contains("[Tool get_uptime]: uptime: 10s"));
    }

    #[test]
    fn message_tool_output_lands_in_the_outbox() {
        let (port, _server) = serve(vec![
            completion("<tool:message>progress update</tool>"),
            completion("done"),
        ]);
        let mut f = Fixture::new(port);
        let out = f.run("notify me");
        assert_eq!(out.outbox, vec!["progress update".to_string()]);
        assert_eq!(out.reply, "done");
    }

    #[test]
    fn unknown_tools_burn_iterations_until_the_cap() {
        let (port, server) = serve(vec![
            completion("<tool:warp_drive>9</tool>"),
            completion("<tool:warp_drive>9</tool>"),
            completion("<tool:warp_drive>9</tool>"),
        ]);
        let mut f = Fixture::new(port);
        let out = f.run("engage");
        // cap is 3 by default; the last reply goes out as-is
        assert_eq!(out.reply, "<tool:warp_drive>9</tool>");
        let reqs = server.join().unwrap();
        assert_eq!(reqs.len(), 3);
        assert!(reqs[1].body.contains("not on this device"));
    }

    #[test]
    fn marker_parsing_is_strict_about_names() {
        assert_eq!(
            parse_tool_marker("<tool:get_uptime></tool>"),
            Some(("get_uptime", ""))
        );
        assert_eq!(
            parse_tool_marker("before <tool:message>hi there</tool> after"),
            Some(("message", "hi there"))
        );
        assert_eq!(
            parse_tool_marker("<tool:message>unclosed args"),
            Some(("message", "unclosed args"))
        );
        assert_eq!(parse_tool_marker("no marker here"), None);
        assert_eq!(parse_tool_marker("<tool:></tool>"), None);
        assert_eq!(parse_tool_marker("a < b > c"), None);
    }
}
