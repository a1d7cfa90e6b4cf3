use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use uuid::Uuid;

use domain::{Command, CommandKind, CommandOrigin};

/// Result of [`CommandQueue::push`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; this older command made room
    Displaced(Command),
    /// Queue was full of MQTT commands; the new poll command was not kept
    Rejected(Command),
}

/// Bounded command queue shared between the MQTT side and a scheduler.
///
/// `push` never waits. When full, the oldest poll-origin command is dropped
/// first; MQTT-origin commands only give way to newer MQTT commands.
/// `pop` hands out MQTT-origin commands before poll-origin ones.
pub struct CommandQueue {
    commands: Mutex<VecDeque<Command>>,
    capacity: usize,
    notify: Notify,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, command: Command) -> PushOutcome {
        let outcome = {
            let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
            let outcome = if commands.len() < self.capacity {
                PushOutcome::Queued
            } else if let Some(oldest_poll) = take_first(&mut commands, CommandOrigin::Poll) {
                PushOutcome::Displaced(oldest_poll)
            } else if command.origin() == CommandOrigin::Poll {
                return PushOutcome::Rejected(command);
            } else {
                match commands.pop_front() {
                    Some(oldest) => PushOutcome::Displaced(oldest),
                    None => PushOutcome::Queued,
                }
            };
            commands.push_back(command);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Next command to execute, MQTT-origin first
    pub fn pop(&self) -> Option<Command> {
        let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        take_first(&mut commands, CommandOrigin::Mqtt).or_else(|| commands.pop_front())
    }

    /// Wait until something was pushed since the last wake-up
    pub async fn wait(&self) {
        self.notify.notified().await
    }

    /// Remove a command that has not started executing yet
    pub fn cancel(&self, id: Uuid) -> Option<Command> {
        let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        let pos = commands.iter().position(|c| c.id() == id)?;
        commands.remove(pos)
    }

    pub fn contains(&self, kind: CommandKind, origin: CommandOrigin) -> bool {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|c| c.kind() == kind && c.origin() == origin)
    }

    pub fn drain(&self) -> Vec<Command> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn take_first(commands: &mut VecDeque<Command>, origin: CommandOrigin) -> Option<Command> {
    let pos = commands.iter().position(|c| c.origin() == origin)?;
    commands.remove(pos)
}
