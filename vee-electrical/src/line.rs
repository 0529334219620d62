// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::rc::{Rc, Weak};

use crate::pin::Pin;

/// An electrical wire joining two or more pins, performing wired-AND
/// arbitration: every member's input tracks the minimum output voltage
/// across the whole line.
pub struct Line {
    pins: Vec<Rc<Pin>>,
}

impl Line {
    /// Builds a line over an already-resolved set of pins. Each member is
    /// marked `has_extern_circuit` and gets the line's arbitration handler
    /// installed as its `on_out_change` callback.
    pub fn new(pins: Vec<Rc<Pin>>) -> Rc<Self> {
        let line = Rc::new(Line { pins });
        let weak: Weak<Line> = Rc::downgrade(&line);
        for pin in &line.pins {
            pin.set_has_extern_circuit(true);
            let weak = weak.clone();
            pin.set_on_out_change(Rc::new(move || {
                if let Some(line) = weak.upgrade() {
                    line.arbitrate();
                }
            }));
        }
        line
    }

    /// Builds a line from a `vee-pins-path` property value: a
    /// comma-separated list of canonical pin paths, each optionally
    /// wrapped in matching single or double quotes. Any path `resolve`
    /// can't look up is logged and skipped rather than failing the whole
    /// line; a line whose property is entirely malformed simply ends up
    /// with empty membership.
    pub fn from_path_spec<F>(raw: &str, resolve: F) -> Rc<Self>
    where
        F: Fn(&str) -> Option<Rc<Pin>>,
    {
        let pins: Vec<Rc<Pin>> = raw
            .split(',')
            .map(str::trim)
            .map(|p| p.trim_matches(|c| c == '\'' || c == '"'))
            .filter(|p| !p.is_empty())
            .filter_map(|path| match resolve(path) {
                Some(pin) => Some(pin),
                None => {
                    log::warn!("vee-line: unresolved pin path {path:?}, skipping");
                    None
                }
            })
            .collect();
        Self::new(pins)
    }

    pub fn pins(&self) -> &[Rc<Pin>] {
        &self.pins
    }

    fn arbitrate(&self) {
        let min_mv = self.pins.iter().map(|p| p.out_voltage_mv()).min().unwrap_or(0);
        for pin in &self.pins {
            pin.set_in_voltage_mv(min_mv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Direction;
    use vee_sys::testing::Harness;

    #[test]
    fn wired_and_tracks_minimum_output() {
        let h = Harness::new();
        let sched = Rc::new(h.clone());
        let p = Pin::new(sched.clone());
        let q = Pin::new(sched.clone());
        let line = Line::new(vec![p.clone(), q.clone()]);

        p.set_output(Direction::In, 3300, 0);
        h.drain();
        q.set_output(Direction::In, 3300, 0);
        h.drain();
        assert_eq!(p.in_voltage_mv(), 3300);
        assert_eq!(q.in_voltage_mv(), 3300);

        // q pulls the line low (e.g. becomes an open-drain output driving 0).
        q.set_output(Direction::Out, 0, 0);
        h.drain();
        assert_eq!(p.in_voltage_mv(), 0);
        assert_eq!(q.in_voltage_mv(), 0);

        drop(line);
    }

    #[test]
    fn malformed_path_spec_yields_empty_line_not_failure() {
        let line = Line::from_path_spec("'bogus/path', \"also/bogus\"", |_| None);
        assert!(line.pins().is_empty());
    }
}
