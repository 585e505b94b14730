use crate::u4;

/// State of the 16-key hex keypad, plus the pending Fx0A request if any.
#[derive(Debug, Default)]
pub struct Keypad {
    keys: [bool; 16],
    /// Register waiting to receive the next pressed key.
    pending_wait: Option<u4>,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as pressed.
    ///
    /// If a wait is armed it is resolved and the target register is returned so the
    /// caller can store `key` into it. A wait is resolved at most once.
    pub fn key_down(&mut self, key: u4) -> Option<u4> {
        self.keys[key] = true;
        self.pending_wait.take()
    }

    pub fn key_up(&mut self, key: u4) {
        self.keys[key] = false;
    }

    pub fn is_key_down(&self, key: u4) -> bool {
        self.keys[key]
    }

    /// Arms a wait for the next key press, replacing any wait already pending.
    pub fn arm_wait(&mut self, target: u4) {
        self.pending_wait = Some(target);
    }

    pub fn pending_wait(&self) -> Option<u4> {
        self.pending_wait
    }

    pub fn keys(&self) -> &[bool; 16] {
        &self.keys
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
