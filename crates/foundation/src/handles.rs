/// Generational handle: `(index, generation)`.
///
/// A handle minted in one generation never compares equal to a handle with
/// the same index from another generation, so stale handles can be detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32, u32);

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        self.1
    }
}

/// Mints handles for one generation at a time.
///
/// `advance` retires every handle of the current generation.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    generation: u32,
    next_index: u32,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> Handle {
        let h = Handle::new(self.next_index, self.generation);
        self.next_index += 1;
        h
    }

    pub fn advance(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.next_index = 0;
    }

    pub fn is_current(&self, handle: Handle) -> bool {
        handle.generation() == self.generation && handle.index() < self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::HandleAllocator;

    #[test]
    fn advance_retires_previous_handles() {
        let mut alloc = HandleAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert!(alloc.is_current(a));

        alloc.advance();
        let c = alloc.alloc();
        assert_eq!(c.index(), 0);
        assert_ne!(a, c);
        assert!(!alloc.is_current(a));
        assert!(alloc.is_current(c));
    }
}
