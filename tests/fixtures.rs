use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use kdb::host::{CommandSink, DebugHost, ExitHook, ExitHookToken, HostCommand};

/// Everything observable the fake host does, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostEvent {
    ExitHookRegistered,
    ExitHookRemoved,
    Command(String),
}

/// In-memory `DebugHost` that records every interaction and can be scripted
/// to refuse a single command verb.
pub struct RecordingHost {
    events: Rc<RefCell<Vec<HostEvent>>>,
    hooks: Vec<(ExitHookToken, ExitHook)>,
    fail_verb: Option<(&'static str, String)>,
}

impl RecordingHost {
    pub fn new() -> Self {
        RecordingHost {
            events: Rc::new(RefCell::new(Vec::new())),
            hooks: Vec::new(),
            fail_verb: None,
        }
    }

    /// Refuse commands whose first word is `verb`, failing with `reason`.
    /// The refused command is still recorded, as a real host would have
    /// received it before reporting the failure.
    pub fn fail_on(mut self, verb: &'static str, reason: &str) -> Self {
        self.fail_verb = Some((verb, reason.to_string()));
        self
    }

    /// Simulate the host's session-exited event, dispatching all hooks.
    pub fn fire_session_exit(&mut self) {
        let mut sink = RecordingSink {
            events: Rc::clone(&self.events),
        };
        for (_, hook) in self.hooks.iter_mut() {
            hook(&mut sink);
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Command(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

struct RecordingSink {
    events: Rc<RefCell<Vec<HostEvent>>>,
}

impl CommandSink for RecordingSink {
    fn issue(&mut self, command: HostCommand) -> Result<()> {
        self.events
            .borrow_mut()
            .push(HostEvent::Command(command.to_string()));
        Ok(())
    }
}

impl DebugHost for RecordingHost {
    fn execute(&mut self, command: HostCommand) -> Result<()> {
        let rendered = command.to_string();
        self.events
            .borrow_mut()
            .push(HostEvent::Command(rendered.clone()));

        if let Some((verb, reason)) = &self.fail_verb
            && rendered.split_whitespace().next() == Some(*verb)
        {
            return Err(anyhow!("{}", reason));
        }
        Ok(())
    }

    fn subscribe_session_exit(&mut self, hook: ExitHook) -> ExitHookToken {
        let token = ExitHookToken::next();
        self.hooks.push((token, hook));
        self.events.borrow_mut().push(HostEvent::ExitHookRegistered);
        token
    }

    fn unsubscribe_session_exit(&mut self, token: ExitHookToken) {
        self.hooks.retain(|(t, _)| *t != token);
        self.events.borrow_mut().push(HostEvent::ExitHookRemoved);
    }
}
