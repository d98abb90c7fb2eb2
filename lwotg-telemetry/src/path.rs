//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;

use itertools::join;

use crate::proto::{Path, PathElem};

// Matches any element name or key value.
const WILDCARD: &str = "*";

// ===== impl Path =====

impl Path {
    /// Parses a path such as `/ports/port[name=eth0]/state/link`.
    ///
    /// Slashes inside key values are kept as part of the value.
    pub fn parse(path: &str) -> Path {
        let mut elem = vec![];
        let mut segment = String::new();
        let mut depth = 0;

        for c in path.chars() {
            match c {
                '[' => depth += 1,
                ']' => depth -= 1,
                '/' if depth == 0 => {
                    if !segment.is_empty() {
                        elem.push(parse_elem(&segment));
                        segment.clear();
                    }
                    continue;
                }
                _ => (),
            }
            segment.push(c);
        }
        if !segment.is_empty() {
            elem.push(parse_elem(&segment));
        }

        Path {
            elem,
            ..Default::default()
        }
    }

    /// Returns a copy of this path with `other`'s elements appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut path = self.clone();
        path.elem.extend(other.elem.iter().cloned());
        if path.origin.is_empty() {
            path.origin.clone_from(&other.origin);
        }
        if path.target.is_empty() {
            path.target.clone_from(&other.target);
        }
        path
    }

    /// Returns whether `path` falls under this path.
    ///
    /// Every element of this path must match the corresponding element of
    /// `path`; `*` matches any name or key value and keys absent from this
    /// path match anything.
    pub fn covers(&self, path: &Path) -> bool {
        self.elem.len() <= path.elem.len()
            && self
                .elem
                .iter()
                .zip(path.elem.iter())
                .all(|(pattern, elem)| elem_matches(pattern, elem))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = join(
            self.elem.iter().map(|pelm| {
                let mut keys = pelm.key.iter().collect::<Vec<_>>();
                keys.sort();
                let keys = join(
                    keys.iter().map(|(key, value)| format!("[{key}={value}]")),
                    "",
                );
                format!("{}{}", pelm.name, keys)
            }),
            "/",
        );

        write!(f, "/{}", path)
    }
}

// ===== helper functions =====

fn parse_elem(segment: &str) -> PathElem {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => segment.split_at(pos),
        None => (segment, ""),
    };

    let mut key = HashMap::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']').unwrap_or(stripped.len());
        let (entry, remaining) = stripped.split_at(end);
        if let Some((k, v)) = entry.split_once('=') {
            key.insert(k.to_owned(), v.to_owned());
        }
        rest = remaining.strip_prefix(']').unwrap_or(remaining);
    }

    PathElem {
        name: name.to_owned(),
        key,
    }
}

fn elem_matches(pattern: &PathElem, elem: &PathElem) -> bool {
    if pattern.name != WILDCARD && pattern.name != elem.name {
        return false;
    }
    pattern.key.iter().all(|(key, value)| {
        value == WILDCARD || elem.key.get(key) == Some(value)
    })
}

// ===== unit tests =====
