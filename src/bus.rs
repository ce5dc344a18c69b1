//! In-process event bus between the widgets and the shell.

use std::collections::VecDeque;

/// Interaction events. Closed set; payloads are typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// Title clicked: reset to default options.
    TitleClicked,
    /// A view link was selected.
    ViewClicked { view: String },
    /// The "Profile" button was pressed.
    ProfileClicked,
    /// A single form control was edited.
    FieldEdited { name: String, value: String },
    /// The address-bar fragment changed, by navigation or by a save.
    FragmentChanged,
    /// Outside navigation to a new address-bar fragment.
    Navigated { fragment: String },
}

impl ShellEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ShellEvent::TitleClicked => "header:click:title",
            ShellEvent::ViewClicked { .. } => "header:click:view",
            ShellEvent::ProfileClicked => "form:click:profile",
            ShellEvent::FieldEdited { .. } => "form:edit:field",
            ShellEvent::FragmentChanged => "window:hashchange",
            ShellEvent::Navigated { .. } => "window:navigate",
        }
    }
}

struct SequencedEvent {
    seq: u64,
    event: ShellEvent,
}

/// FIFO bus. Events published while handling another are delivered after it.
#[derive(Default)]
pub struct EventBus {
    queue: VecDeque<SequencedEvent>,
    seq_counter: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sequence number assigned to the event.
    pub fn publish(&mut self, event: ShellEvent) -> u64 {
        self.seq_counter += 1;
        self.queue.push_back(SequencedEvent {
            seq: self.seq_counter,
            event,
        });
        self.seq_counter
    }

    pub fn pop(&mut self) -> Option<(u64, ShellEvent)> {
        self.queue.pop_front().map(|se| (se.seq, se.event))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

}
