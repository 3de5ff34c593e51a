//! Read-only view of the route's interlocking sections.
//!
//! Sections form a forward-linked list (possibly cyclic on loop routes).  Each
//! section carries an ordered aspect table and the index of the aspect it
//! currently shows.  The route owns the data; the bridge only reads it.

use atsbridge_types::TrainId;

/// One entry of a section's aspect table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionAspect {
    /// Aspect number as understood by safety modules (0 = red).
    pub number: i32,
    /// Speed limit attached to the aspect, in m/s.
    pub speed: f64,
}

impl SectionAspect {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            speed: f64::INFINITY,
        }
    }
}

/// One interlocking block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    /// Track position of the signal protecting the section, in meters.
    pub track_position: f64,
    pub aspects: Vec<SectionAspect>,
    /// Index into [`aspects`][Self::aspects], `None` when the signal is dark.
    pub current_aspect: Option<usize>,
    /// Index of the following section.
    pub next: Option<usize>,
    /// Trains currently inside the section.
    pub trains: Vec<TrainId>,
}

impl Section {
    /// Number of the aspect currently shown, if any.
    pub fn current_aspect_number(&self) -> Option<i32> {
        self.current_aspect
            .and_then(|i| self.aspects.get(i))
            .map(|a| a.number)
    }

    /// Number of the last entry of the aspect table.
    pub fn last_aspect_number(&self) -> Option<i32> {
        self.aspects.last().map(|a| a.number)
    }

    pub fn is_occupied_by(&self, train: TrainId) -> bool {
        self.trains.contains(&train)
    }
}

/// Read access to the section list.
pub trait SectionGraph {
    fn section(&self, index: usize) -> Option<&Section>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SectionGraph for [Section] {
    fn section(&self, index: usize) -> Option<&Section> {
        self.get(index)
    }

    fn len(&self) -> usize {
        <[Section]>::len(self)
    }
}

impl SectionGraph for Vec<Section> {
    fn section(&self, index: usize) -> Option<&Section> {
        self.get(index)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}
