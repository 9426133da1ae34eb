//! Path resolution over the live actor tree.
//!
//! Paths are `/`-separated. Evaluated relative to an actor `c`:
//!
//! - a leading `/` starts from the root (`/` alone is the root itself);
//! - a leading `.` or `c`'s own name stays on `c`;
//! - `..` moves to the parent;
//! - anything else names a live child.
//!
//! Only the first segment of a relative path may name `c` itself, so a child
//! sharing its parent's name stays reachable. Empty segments inside a path
//! never resolve; one trailing `/` is ignored. Each step reads a snapshot of
//! one actor's children, so concurrent creation or stop may be observed late
//! but never inconsistently.

use std::sync::Arc;

use crate::runnable::Runnable;

pub(crate) fn resolve(from: &Arc<Runnable>, path: &str) -> Option<Arc<Runnable>> {
	if path.is_empty() {
		return None;
	}

	let (mut current, rest) = match path.strip_prefix('/') {
		Some(rest) => (from.root(), rest),
		None => {
			let (first, rest) = path.split_once('/').unwrap_or((path, ""));
			let start = match first {
				"." => Arc::clone(from),
				name if name == from.name() => Arc::clone(from),
				segment => step(from, segment)?,
			};
			(start, rest)
		}
	};

	let rest = rest.strip_suffix('/').unwrap_or(rest);
	if rest.is_empty() {
		return Some(current);
	}
	for segment in rest.split('/') {
		current = step(&current, segment)?;
	}
	Some(current)
}

fn step(current: &Arc<Runnable>, segment: &str) -> Option<Arc<Runnable>> {
	match segment {
		"" => None,
		"." => Some(Arc::clone(current)),
		".." => current.parent(),
		name => current.live_child(name),
	}
}
