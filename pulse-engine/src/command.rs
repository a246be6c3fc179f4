//! Movement commands and the bounded command queue.

/// A single movement request for both axes.
///
/// Delays are step delays in microseconds; a fast move ramps from the
/// start delay down to the end delay and back. Microstepped moves run at
/// a constant delay (start == end).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    /// Desired signed motor revolutions, declination axis.
    pub revs_dec: f64,
    /// Desired signed motor revolutions, right-ascension axis.
    pub revs_ra: f64,
    pub delay_start_dec_us: f64,
    pub delay_start_ra_us: f64,
    pub delay_end_dec_us: f64,
    pub delay_end_ra_us: f64,
    /// Drive the microstep-enable lines for this move.
    pub microstepping: bool,
}

/// Fixed-capacity FIFO of movement commands.
///
/// Backed by a ring of preallocated slots; nothing is allocated after
/// construction. Overflow policy is drop-newest: pushing into a full
/// queue discards the pushed command and leaves the queue untouched.
/// Callers that care can check the return value of [`push`](Self::push),
/// but a dropped command is by design not a fault.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    slots: Vec<Option<MoveCommand>>,
    head: usize,
    len: usize,
}

impl CommandQueue {
    /// Create a queue holding at most `capacity` commands.
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Command queue capacity must be greater than 0");
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a command. Returns false if the queue was full and the
    /// command was dropped.
    pub fn push(&mut self, cmd: MoveCommand) -> bool {
        if self.len == self.slots.len() {
            return false;
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(cmd);
        self.len += 1;
        true
    }

    /// Remove and return the oldest command.
    pub fn pop(&mut self) -> Option<MoveCommand> {
        if self.len == 0 {
            return None;
        }
        let cmd = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        cmd
    }

    /// Discard all queued commands.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
