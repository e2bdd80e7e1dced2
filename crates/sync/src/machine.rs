use foundation::ids::Generation;
use tracing::debug;

/// Data region of the sync machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataState {
    Loading,
    Loaded,
    Error,
}

/// Display region of the sync machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DisplayState {
    /// No map widget yet.
    None,
    /// Map exists; markers must be (re)clustered.
    Rendering,
    /// Markers reflect the current dataset.
    Interactive,
}

/// Everything the sync machine reacts to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The map widget exists.
    Render,
    /// The map widget was re-initialized.
    Repoint,
    /// The index was rebuilt for the current dataset.
    Point,
    /// The map widget is gone.
    Rerender,
    /// Refetch everything.
    Reload,
    /// Both fetches issued under `generation` succeeded.
    FetchSucceeded { generation: Generation },
    /// A fetch issued under `generation` failed.
    FetchFailed { generation: Generation },
}

/// What [`SyncMachine::send`] did with an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The event has no transition from the current states.
    Ignored,
    /// A fetch completion from an earlier generation.
    Stale,
}

/// Two parallel regions sharing one generation counter.
///
/// The data region starts in `Loading` under generation 1; every re-entry
/// into `Loading` bumps the generation. The display region starts in `None`.
/// `Point` is only accepted while the joint gate is open, so the display
/// region can never reach `Interactive` ahead of the data region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMachine {
    data: DataState,
    display: DisplayState,
    generation: Generation,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMachine {
    pub fn new() -> Self {
        Self {
            data: DataState::Loading,
            display: DisplayState::None,
            generation: Generation::default().next(),
        }
    }

    pub fn data(&self) -> DataState {
        self.data
    }

    pub fn display(&self) -> DisplayState {
        self.display
    }

    /// Generation of the most recent entry into `Loading`.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Data loaded and display waiting for a re-cluster.
    pub fn joint_ready(&self) -> bool {
        self.data == DataState::Loaded && self.display == DisplayState::Rendering
    }

    pub fn send(&mut self, event: SyncEvent) -> Transition {
        let before = (self.data, self.display);
        let transition = match event {
            SyncEvent::Reload => {
                self.generation = self.generation.next();
                self.data = DataState::Loading;
                self.display = DisplayState::Rendering;
                Transition::Applied
            }
            SyncEvent::FetchSucceeded { generation } | SyncEvent::FetchFailed { generation }
                if generation != self.generation =>
            {
                Transition::Stale
            }
            SyncEvent::FetchSucceeded { .. } if self.data == DataState::Loading => {
                self.data = DataState::Loaded;
                Transition::Applied
            }
            SyncEvent::FetchFailed { .. } if self.data == DataState::Loading => {
                self.data = DataState::Error;
                Transition::Applied
            }
            SyncEvent::Render if self.display == DisplayState::None => {
                self.display = DisplayState::Rendering;
                Transition::Applied
            }
            SyncEvent::Point if self.joint_ready() => {
                self.display = DisplayState::Interactive;
                Transition::Applied
            }
            SyncEvent::Repoint if self.display == DisplayState::Interactive => {
                self.display = DisplayState::Rendering;
                Transition::Applied
            }
            SyncEvent::Rerender if self.display != DisplayState::None => {
                self.display = DisplayState::None;
                Transition::Applied
            }
            _ => Transition::Ignored,
        };

        debug!(
            ?event,
            ?transition,
            from = ?before,
            to = ?(self.data, self.display),
            generation = %self.generation,
            "sync transition"
        );
        transition
    }
}
