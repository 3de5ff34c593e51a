//! Signal lookahead – beacon messages built from the section graph.
//!
//! When the train passes a beacon, the module receives the aspect of a
//! referenced section and the distance to it.  The reference is either an
//! explicit section, "none", or the next section ahead that shows red.

use atsbridge_hal::SectionGraph;
use atsbridge_types::{AtsBeaconData, NO_SIGNAL_ASPECT, TrainPosition};
use tracing::trace;

/// Raw beacon section reference meaning "no section".
pub const BEACON_NO_SECTION: i32 = -1;
/// Raw beacon section reference meaning "next section showing red".
pub const BEACON_NEXT_RED_SECTION: i32 = -2;

/// Section a beacon refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconTarget {
    None,
    NextRedSection,
    Section(usize),
}

impl BeaconTarget {
    /// Interpret a raw route value.  Negative values other than
    /// [`BEACON_NEXT_RED_SECTION`] mean no section.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            BEACON_NEXT_RED_SECTION => BeaconTarget::NextRedSection,
            r if r >= 0 => BeaconTarget::Section(r as usize),
            _ => BeaconTarget::None,
        }
    }
}

/// One beacon event as pushed to the module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeaconMessage {
    pub kind: i32,
    pub aspect: i32,
    /// Meters from the train's reference point; `f64::MAX` when no section
    /// was resolved.
    pub distance: f64,
    pub optional: i32,
}

impl BeaconMessage {
    /// Wire form.  Distances beyond the `f32` range saturate at `±f32::MAX`.
    pub fn to_abi(&self) -> AtsBeaconData {
        AtsBeaconData {
            kind: self.kind,
            signal: self.aspect,
            distance: self.distance.clamp(f64::from(f32::MIN), f64::from(f32::MAX)) as f32,
            optional: self.optional,
        }
    }
}

/// Follow forward links from the section after `start` to the first section
/// whose current aspect number is 0.  Gives up after `graph.len()` hops.
pub fn find_next_red<G: SectionGraph + ?Sized>(graph: &G, start: usize) -> Option<usize> {
    let mut cursor = graph.section(start)?.next;
    for _ in 0..graph.len() {
        let index = cursor?;
        let section = graph.section(index)?;
        if section.current_aspect_number() == Some(0) {
            return Some(index);
        }
        cursor = section.next;
    }
    trace!(start, "next-red search exhausted hop budget");
    None
}

/// Aspect reported for section `index` when the train is inside it.
///
/// The section's aspect table is scanned from the last entry to the first;
/// the last visited entry whose number exceeds the next section's current
/// aspect number wins.  With no such entry, no next section, or a dark next
/// section, the last table entry is used.
fn occupied_section_aspect<G: SectionGraph + ?Sized>(graph: &G, index: usize) -> Option<i32> {
    let section = graph.section(index)?;
    let next_number = section
        .next
        .and_then(|n| graph.section(n))
        .and_then(|n| n.current_aspect_number());
    let mut chosen = None;
    if let Some(next_number) = next_number {
        for (i, aspect) in section.aspects.iter().enumerate().rev() {
            if aspect.number > next_number {
                chosen = Some(i);
            }
        }
    }
    match chosen {
        Some(i) => section.aspects.get(i).map(|a| a.number),
        None => section.last_aspect_number(),
    }
}

/// Aspect number currently shown by section `index`, or 255 when it is dark
/// or does not exist.
pub fn section_signal_aspect<G: SectionGraph + ?Sized>(graph: &G, index: usize) -> i32 {
    graph
        .section(index)
        .and_then(|s| s.current_aspect_number())
        .unwrap_or(NO_SIGNAL_ASPECT)
}

/// Build the beacon message for a train passing a beacon.
///
/// # Example
///
/// ```
/// use atsbridge_hal::sim::SimRoute;
/// use atsbridge_kernel::signal_lookahead::{encode_beacon, BeaconTarget};
/// use atsbridge_types::{TrainId, TrainPosition};
///
/// let route = SimRoute::new()
///     .with_section(0.0, &[0, 5], Some(1))
///     .with_section(400.0, &[0, 5], Some(0))
///     .build();
/// let train = TrainPosition { train: TrainId(1), current_section: Some(0), reference_point: 150.0 };
///
/// let msg = encode_beacon(route.as_slice(), &train, 3, BeaconTarget::NextRedSection, 0);
/// assert_eq!(msg.aspect, 0);
/// assert_eq!(msg.distance, 250.0);
/// ```
pub fn encode_beacon<G: SectionGraph + ?Sized>(
    graph: &G,
    train: &TrainPosition,
    kind: i32,
    target: BeaconTarget,
    optional: i32,
) -> BeaconMessage {
    let resolved = match target {
        BeaconTarget::None => None,
        BeaconTarget::Section(index) => Some(index),
        BeaconTarget::NextRedSection => train
            .current_section
            .and_then(|current| find_next_red(graph, current)),
    };

    let (aspect, distance) = match resolved.and_then(|i| graph.section(i).map(|s| (i, s))) {
        Some((index, section)) => {
            let aspect = if section.is_occupied_by(train.train) {
                occupied_section_aspect(graph, index)
            } else {
                section.current_aspect_number()
            };
            (
                aspect.unwrap_or(NO_SIGNAL_ASPECT),
                section.track_position - train.reference_point,
            )
        }
        None => (NO_SIGNAL_ASPECT, f64::MAX),
    };

    BeaconMessage {
        kind,
        aspect,
        distance,
        optional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atsbridge_hal::Section;
    use atsbridge_hal::sim::SimRoute;
    use atsbridge_types::TrainId;

    const ME: TrainId = TrainId(1);

    fn at(section: Option<usize>, reference_point: f64) -> TrainPosition {
        TrainPosition {
            train: ME,
            current_section: section,
            reference_point,
        }
    }

    #[test]
    fn raw_targets() {
        assert_eq!(BeaconTarget::from_raw(-1), BeaconTarget::None);
        assert_eq!(BeaconTarget::from_raw(-2), BeaconTarget::NextRedSection);
        assert_eq!(BeaconTarget::from_raw(-7), BeaconTarget::None);
        assert_eq!(BeaconTarget::from_raw(4), BeaconTarget::Section(4));
    }

    #[test]
    fn next_red_resolves_through_chain() {
        // S (train) → A → B → C(red)
        let route = SimRoute::new()
            .with_section(0.0, &[0, 2, 5], Some(2))
            .occupied_by(ME)
            .with_section(300.0, &[0, 2, 5], Some(2))
            .with_section(800.0, &[0, 2, 5], Some(1))
            .with_section(1500.0, &[0, 2, 5], Some(0))
            .build();
        let msg = encode_beacon(route.as_slice(), &at(Some(0), 120.0), 0, BeaconTarget::NextRedSection, 42);
        assert_eq!(msg.aspect, 0);
        assert!((msg.distance - (1500.0 - 120.0)).abs() < f64::EPSILON);
        assert_eq!(msg.optional, 42);
    }

    #[test]
    fn next_red_search_skips_current_section() {
        let route = SimRoute::new()
            .with_section(0.0, &[0, 5], Some(0))
            .with_section(500.0, &[0, 5], Some(0))
            .build();
        assert_eq!(find_next_red(route.as_slice(), 0), Some(1));
    }

    #[test]
    fn next_red_chain_end_reports_no_signal() {
        let route = SimRoute::new()
            .with_section(0.0, &[0, 5], Some(1))
            .with_section(500.0, &[0, 5], Some(1))
            .build();
        let msg = encode_beacon(route.as_slice(), &at(Some(0), 10.0), 0, BeaconTarget::NextRedSection, 0);
        assert_eq!(msg.aspect, 255);
        assert_eq!(msg.distance, f64::MAX);
        assert_eq!(msg.to_abi().distance, f32::MAX);
    }

    #[test]
    fn next_red_terminates_on_cycles() {
        let route = SimRoute::new()
            .with_section(0.0, &[0, 5], Some(1))
            .with_section(500.0, &[0, 5], Some(1))
            .with_section(900.0, &[0, 5], None)
            .looped()
            .build();
        assert_eq!(find_next_red(route.as_slice(), 0), None);
    }

    #[test]
    fn no_current_section_means_no_signal() {
        let route = SimRoute::new().with_section(0.0, &[0], Some(0)).build();
        let msg = encode_beacon(route.as_slice(), &at(None, 0.0), 0, BeaconTarget::NextRedSection, 0);
        assert_eq!(msg.aspect, 255);
        let msg = encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::None, 0);
        assert_eq!(msg.aspect, 255);
        let msg = encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::Section(9), 0);
        assert_eq!(msg.aspect, 255);
    }

    #[test]
    fn explicit_section_reports_current_aspect_and_signed_distance() {
        let route = SimRoute::new()
            .with_section(0.0, &[0, 2, 5], Some(1))
            .with_section(500.0, &[0, 2, 5], None)
            .build();
        let msg = encode_beacon(route.as_slice(), &at(Some(1), 650.0), 7, BeaconTarget::Section(0), 0);
        assert_eq!(msg.aspect, 2);
        assert!((msg.distance + 650.0).abs() < f64::EPSILON);
        assert_eq!(msg.kind, 7);

        let dark = encode_beacon(route.as_slice(), &at(Some(0), 0.0), 7, BeaconTarget::Section(1), 0);
        assert_eq!(dark.aspect, 255);
    }

    #[test]
    fn occupied_section_takes_lowest_index_above_next_aspect() {
        // Own section table [0, 2, 3, 5]; next shows 2 → entries above 2 are
        // indices 2 and 3, the scan keeps index 2 (number 3).
        let route = SimRoute::new()
            .with_section(0.0, &[0, 2, 3, 5], Some(0))
            .occupied_by(ME)
            .with_section(500.0, &[0, 2, 5], Some(1))
            .build();
        let msg = encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::Section(0), 0);
        assert_eq!(msg.aspect, 3);
    }

    #[test]
    fn occupied_section_falls_back_to_last_entry() {
        let occupied_with_next = |next_current: Option<usize>| -> Vec<Section> {
            SimRoute::new()
                .with_section(0.0, &[0, 2, 5], Some(0))
                .occupied_by(ME)
                .with_section(500.0, &[0, 2, 5], next_current)
                .build()
        };

        // Next shows the highest aspect: nothing exceeds it.
        let route = occupied_with_next(Some(2));
        assert_eq!(encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::Section(0), 0).aspect, 5);

        // Next is dark.
        let route = occupied_with_next(None);
        assert_eq!(encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::Section(0), 0).aspect, 5);

        // No next section at all.
        let route = SimRoute::new()
            .with_section(0.0, &[0, 4], Some(0))
            .occupied_by(ME)
            .build();
        assert_eq!(encode_beacon(route.as_slice(), &at(Some(0), 0.0), 0, BeaconTarget::Section(0), 0).aspect, 4);
    }

    #[test]
    fn section_signal_aspect_defaults_to_255() {
        let route = SimRoute::new()
            .with_section(0.0, &[0, 5], Some(1))
            .with_section(0.0, &[0, 5], None)
            .build();
        assert_eq!(section_signal_aspect(route.as_slice(), 0), 5);
        assert_eq!(section_signal_aspect(route.as_slice(), 1), 255);
        assert_eq!(section_signal_aspect(route.as_slice(), 2), 255);
    }

    #[test]
    fn negative_distance_saturates_on_the_wire() {
        let msg = BeaconMessage {
            kind: 0,
            aspect: 0,
            distance: -f64::MAX,
            optional: 0,
        };
        assert_eq!(msg.to_abi().distance, f32::MIN);
    }
}
