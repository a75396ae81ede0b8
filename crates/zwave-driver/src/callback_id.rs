/// Hands out callback ids in `1..=255`, wrapping from 255 back to 1.
///
/// Id 0 asks the controller not to send a callback and is never issued.
#[derive(Debug, Clone)]
pub struct CallbackIdAllocator {
    next: u8,
}

impl CallbackIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u8 {
        let id = self.next;
        self.next = if id == u8::MAX { 1 } else { id + 1 };
        id
    }

    /// Next id for which `in_use` is false. `None` only if all 255 are taken.
    pub fn allocate(&mut self, in_use: impl Fn(u8) -> bool) -> Option<u8> {
        (0..u8::MAX).map(|_| self.next_id()).find(|id| !in_use(*id))
    }
}

impl Default for CallbackIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
