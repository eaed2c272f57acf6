use crate::model::*;

// ── Free-window math ─────────────────────────────────────────────

/// Free windows for a room: the query window minus every active reservation
/// span, clamped to the window. A room with its availability flag off has no
/// bookable windows at all.
pub fn free_slots(room: &RoomState, query: &Span) -> Vec<Span> {
    if !room.available {
        return Vec::new();
    }

    let mut busy: Vec<Span> = room
        .overlapping(query)
        .filter(|r| r.is_active())
        .map(|r| {
            Span::new(
                r.span.start.max(query.start),
                r.span.end.min(query.end),
            )
        })
        .collect();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);

    subtract_spans(&[*query], &busy)
}

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Subtract sorted disjoint `to_remove` spans from sorted `base` spans.
pub fn subtract_spans(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
