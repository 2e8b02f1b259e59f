//! Property-based tests over randomly generated multi-node traces.
//!
//! Key invariants:
//! - Building is independent of payload order, including the pairing of
//!   await-pushes with pushes
//! - Every dependency edge is mirrored on both endpoints
//! - Every command is homed at its midpoint bucket and referenced from each
//!   bucket its span touches
//! - Widening the vicinity radius never hides a bucket
//! - Idle gaps never overlap each other or a command on the same node
//! - The critical path ends at a command without walkable predecessors

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use proptest::sample::Index;

use taskscope_analysis::{critical_path, find_gaps, IndexConfig, TemporalIndex};
use taskscope_core::testing::{task_command, transfer, PayloadBuilder};
use taskscope_core::{build, CommandId, CommandKind, DependencyKind, RawPayload, Trace};

/// Generated task command: node selector, raw start, length, predecessor
/// picks with their kinds.
type GenCommand = (u32, i64, i64, Vec<(Index, DependencyKind)>);

/// Generated transfer: source node selector, buffer, await-push end, distance
/// of the two competing pushes from it, and whether both are equally far.
type GenTransfer = (u32, u64, i64, i64, i64, bool);

fn dependency_kind() -> impl Strategy<Value = DependencyKind> {
    prop_oneof![
        3 => Just(DependencyKind::True),
        1 => Just(DependencyKind::Order),
        1 => Just(DependencyKind::Anti),
    ]
}

fn to_payloads(
    reference_times: &[u64],
    commands: &[GenCommand],
    transfers: &[GenTransfer],
) -> Vec<RawPayload> {
    let nodes = reference_times.len() as u32;
    let offset = |node: u32| reference_times[node as usize] as i64 - reference_times[0] as i64;
    let mut builders: Vec<PayloadBuilder> = reference_times
        .iter()
        .enumerate()
        .map(|(node, &ref_time)| PayloadBuilder::node(node as u32, ref_time))
        .collect();
    let mut push_onto = |node: u32, f: &dyn Fn(PayloadBuilder) -> PayloadBuilder| {
        let slot = node as usize;
        let builder = std::mem::take(&mut builders[slot]);
        builders[slot] = f(builder);
    };

    for (i, (node, start, len, preds)) in commands.iter().enumerate() {
        let id = i as u64 + 1;
        let deps: Vec<(CommandId, DependencyKind)> = if i == 0 {
            Vec::new()
        } else {
            preds
                .iter()
                .map(|(p, kind)| (p.index(i) as u64 + 1, *kind))
                .collect()
        };
        let cmd = task_command(id, *node, &deps);
        push_onto(*node, &|b: PayloadBuilder| b.timed(cmd.clone(), *start, start + len));
    }

    let first_transfer = commands.len() as u64 + 1;
    for (g, &(src, buffer, await_end, near, far, tie)) in transfers.iter().enumerate() {
        let dst = (src + 1) % nodes;
        let base = first_transfer + 3 * g as u64;
        // Raw push ends chosen so the normalized deviations are `near` and
        // `far` (or `near` twice).
        let centre = await_end + offset(dst) - offset(src);
        let later = if tie { near } else { far };

        let await_push = transfer(base, CommandKind::AwaitPush, dst, src, buffer, 4);
        push_onto(dst, &|b: PayloadBuilder| b.timed(await_push.clone(), await_end - 50, await_end));

        let early = transfer(base + 1, CommandKind::Push, src, dst, buffer, 4);
        let late = transfer(base + 2, CommandKind::Push, src, dst, buffer, 4);
        push_onto(src, &|b: PayloadBuilder| {
            b.timed(early.clone(), centre - near - 10, centre - near)
                .timed(late.clone(), centre + later - 10, centre + later)
        });
    }

    builders.into_iter().map(PayloadBuilder::build).collect()
}

fn payloads() -> impl Strategy<Value = Vec<RawPayload>> {
    (1usize..4)
        .prop_flat_map(|nodes| {
            (
                prop::collection::vec(1u64..10_000, nodes),
                prop::collection::vec(
                    (
                        0..nodes as u32,
                        0i64..100_000,
                        0i64..20_000,
                        prop::collection::vec((any::<Index>(), dependency_kind()), 0..3),
                    ),
                    1..40,
                ),
                prop::collection::vec(
                    (
                        0..nodes as u32,
                        0u64..2,
                        20_000i64..80_000,
                        0i64..1_000,
                        0i64..1_000,
                        any::<bool>(),
                    ),
                    0..4,
                ),
            )
        })
        .prop_map(|(refs, commands, transfers)| to_payloads(&refs, &commands, &transfers))
}

fn shuffled_payloads() -> impl Strategy<Value = (Vec<RawPayload>, Vec<RawPayload>)> {
    payloads().prop_flat_map(|p| (Just(p.clone()), Just(p).prop_shuffle()))
}

fn built() -> impl Strategy<Value = Trace> {
    payloads().prop_map(|p| build(&p).unwrap())
}

/// Every inferred data edge as (await-push, push).
fn data_edges(trace: &Trace) -> BTreeSet<(CommandId, CommandId)> {
    trace
        .commands()
        .filter(|c| c.kind == CommandKind::AwaitPush)
        .flat_map(|c| trace.command_predecessors(c.id))
        .filter(|(_, dep)| dep.kind == DependencyKind::Data)
        .map(|(_, dep)| (dep.origin, dep.target))
        .collect()
}

proptest! {
    /// Payload order never changes command timing, the trace bounds or the
    /// push chosen for each await-push.
    #[test]
    fn build_is_order_independent((original, shuffled) in shuffled_payloads()) {
        let a = build(&original).unwrap();
        let b = build(&shuffled).unwrap();

        prop_assert_eq!(a.min_start_time(), b.min_start_time());
        prop_assert_eq!(a.max_end_time(), b.max_end_time());
        prop_assert_eq!(a.duration(), b.duration());
        prop_assert_eq!(a.dependency_count(), b.dependency_count());
        for cmd in a.commands() {
            let other = b.get_command(cmd.id).map(|c| c.span());
            prop_assert_eq!(Some(cmd.span()), other);
        }
        prop_assert_eq!(data_edges(&a), data_edges(&b));
    }

    /// Each await-push is paired once, with the lowest-id push among the
    /// closest ones.
    #[test]
    fn await_push_pairs_with_closest_lowest_id_push(trace in built()) {
        let edges = data_edges(&trace);
        let awaits = trace.commands().filter(|c| c.kind == CommandKind::AwaitPush).count();
        prop_assert_eq!(edges.len(), awaits);

        for (await_id, push_id) in edges {
            let await_cmd = trace.get_command(await_id).unwrap();
            let chosen = trace.get_command(push_id).unwrap();
            let deviation = chosen.end_time().abs_diff(await_cmd.end_time());
            for push in trace.commands().filter(|c| {
                c.kind == CommandKind::Push
                    && c.buffer_accesses == await_cmd.buffer_accesses
                    && Some(c.node) == await_cmd.other_node
                    && c.other_node == Some(await_cmd.node)
            }) {
                let other = push.end_time().abs_diff(await_cmd.end_time());
                prop_assert!(other > deviation || (other == deviation && push.id >= push_id));
            }
        }
    }

    /// Every edge is listed once on each endpoint.
    #[test]
    fn dependencies_are_mirrored(trace in built()) {
        prop_assert!(trace.validate_mirroring().is_ok());
    }

    /// Commands are homed at their midpoint and referenced from their span.
    #[test]
    fn index_covers_every_command(trace in built(), bucket_width in 1_000i64..50_000) {
        let index = TemporalIndex::from_trace(&trace, &IndexConfig { bucket_width }).unwrap();
        let min = trace.min_start_time();

        for cmd in trace.commands() {
            let home = index.bucket_index_for_time(cmd.midpoint() - min).unwrap();
            prop_assert!(index.chunk(home).unwrap().commands().contains(&cmd.id));

            let first = index.bucket_index_for_time(cmd.start_time() - min).unwrap();
            let last = index.bucket_index_for_time(cmd.end_time() - min).unwrap();
            for i in first..=last {
                prop_assert!(index.chunk(i).unwrap().overlapping().contains(&home));
            }
        }
    }

    /// A wider vicinity is a superset of a narrower one.
    #[test]
    fn vicinity_is_monotonic(
        trace in built(),
        bucket_width in 1_000i64..50_000,
        center in 0.0f64..=1.0,
        r1 in 0i64..50_000,
        extra in 0i64..50_000,
    ) {
        let index = TemporalIndex::from_trace(&trace, &IndexConfig { bucket_width }).unwrap();
        let center = (trace.duration() as f64 * center) as i64;

        let narrow = index.visible_set(center, r1).unwrap();
        let wide = index.visible_set(center, r1 + extra).unwrap();
        prop_assert!(narrow.is_subset(&wide));
        prop_assert!(!narrow.is_empty());
    }

    /// Gaps on a node are disjoint from each other and from its commands.
    #[test]
    fn gaps_do_not_overlap(trace in built(), min_gap in 0i64..5_000) {
        let gaps = find_gaps(&trace, min_gap, false);
        let min = trace.min_start_time();
        let by_node = trace.commands_by_node();

        for gap in &gaps {
            prop_assert!(gap.length() > 0);
            prop_assert!(gap.length() >= min_gap);
            for cmd in &by_node[&gap.node] {
                let (start, end) = (cmd.start_time() - min, cmd.end_time() - min);
                prop_assert!(!(start < gap.end && end > gap.start), "gap {:?} overlaps {}", gap, cmd);
            }
        }
        for (i, a) in gaps.iter().enumerate() {
            for b in gaps.iter().skip(i + 1).filter(|b| b.node == a.node) {
                prop_assert!(a.end <= b.start || b.end <= a.start);
            }
        }
    }

    /// The walk never repeats a command and stops only where no non-anti
    /// predecessor is left.
    #[test]
    fn critical_path_terminates_at_source(trace in built()) {
        let path = critical_path(&trace).unwrap();
        prop_assert_eq!(path.commands.len(), path.dependencies.len() + 1);

        let terminal = trace.get_command(path.terminal().unwrap()).unwrap();
        prop_assert_eq!(terminal.end_time(), trace.max_end_time());

        let source = path.source().unwrap();
        prop_assert!(trace
            .command_predecessors(source)
            .all(|(_, dep)| dep.kind == DependencyKind::Anti));

        for &dep in &path.dependencies {
            let kind = trace.command_dependency(dep).unwrap().kind;
            prop_assert_ne!(kind, DependencyKind::Anti);
        }

        let unique: HashSet<_> = path.commands.iter().collect();
        prop_assert_eq!(unique.len(), path.commands.len());
    }
}
