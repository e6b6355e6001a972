//! Shortcut unpacking - expand shortcuts to base edges

use butterfly_common::{Error, Result};

use super::route::PathEdge;
use crate::storage::{DataAccess, EdgeId, GraphStorage, NodeId};

/// Append the base edges of `edge`, traversed `from -> to`, to `out`
pub fn unpack_edge<D: DataAccess>(
    graph: &GraphStorage<D>,
    edge: EdgeId,
    from: NodeId,
    to: NodeId,
    out: &mut Vec<PathEdge>,
) -> Result<()> {
    unpack(graph, edge, edge, from, to, out)
}

fn unpack<D: DataAccess>(
    graph: &GraphStorage<D>,
    parent: EdgeId,
    edge: EdgeId,
    from: NodeId,
    to: NodeId,
    out: &mut Vec<PathEdge>,
) -> Result<()> {
    let missing = || Error::MissingSkippedEdge {
        shortcut: parent,
        skipped: edge,
    };
    graph.check_edge(edge).map_err(|_| missing())?;
    let view = graph
        .edge(edge, to)
        .filter(|v| v.base == from)
        .ok_or_else(missing)?;

    let Some((skip1, skip2)) = view.skipped else {
        out.push(PathEdge {
            edge,
            from,
            to,
            weight: view.weight,
        });
        return Ok(());
    };

    for skip in [skip1, skip2] {
        graph.check_edge(skip).map_err(|_| Error::MissingSkippedEdge {
            shortcut: edge,
            skipped: skip,
        })?;
    }

    // The skipped edge touching `from` comes first
    let touches = |e: EdgeId, node: NodeId| {
        let (a, b) = graph.endpoints(e);
        a == node || b == node
    };
    let (first, second) = if touches(skip1, from) {
        (skip1, skip2)
    } else if touches(skip2, from) {
        (skip2, skip1)
    } else {
        tracing::trace!(edge, from, to, skip1, skip2, "unpack: no skipped edge touches source");
        return Err(Error::MissingSkippedEdge {
            shortcut: edge,
            skipped: skip1,
        });
    };
    let (a, b) = graph.endpoints(first);
    let middle = if a == from { b } else { a };
    if !touches(second, middle) || !touches(second, to) {
        tracing::trace!(edge, middle, to, second, "unpack: skipped edges do not connect");
        return Err(Error::MissingSkippedEdge {
            shortcut: edge,
            skipped: second,
        });
    }

    tracing::trace!(edge, from, middle, to, "unpack shortcut");
    unpack(graph, edge, first, from, middle, out)?;
    unpack(graph, edge, second, middle, to, out)
}
