//! HarvestService unit tests

#[cfg(test)]
mod tests {
    use janet_harvest::config::{load_config_str, validate};
    use janet_harvest::durations::{DurationTable, MAX_DURATION_TICKS};
    use janet_harvest::error::{DeliveryError, HarvestError};
    use janet_harvest::gate::{GateCheck, LevelGate};
    use janet_harvest::operation::{CancelReason, OperationState};
    use janet_harvest::protocol::{NodeHarvested, OperationCancelled};
    use janet_harvest::service::{BeginOutcome, Collaborators, HarvestService, TickEvents};
    use janet_harvest::sink::{Broadcast, ProgressSink, RecordingSink};
    use janet_harvest::stats::StatTable;
    use janet_harvest::types::{
        ActorId, AnimationId, BlockPos, HarvestConfig, ItemStack, ResourceFamily, Target,
    };
    use janet_harvest::world::{GridWorld, NodeWorld};
    use std::sync::Arc;

    struct Harness {
        svc: HarvestService,
        world: Arc<GridWorld>,
        stats: Arc<StatTable>,
        gate: Arc<LevelGate>,
        sink: Arc<RecordingSink>,
    }

    fn make_harness(config: HarvestConfig) -> Harness {
        let world = Arc::new(GridWorld::new());
        let stats = Arc::new(StatTable::new());
        let gate = Arc::new(LevelGate::new());
        let sink = Arc::new(RecordingSink::new());

        let collab = Collaborators {
            world: world.clone(),
            stats: stats.clone(),
            gate: gate.clone(),
            sink: sink.clone(),
        };
        let durations = DurationTable::from_config(&config);
        let svc = HarvestService::new(config, durations, collab).expect("valid config");

        Harness {
            svc,
            world,
            stats,
            gate,
            sink,
        }
    }

    fn seeded_config() -> HarvestConfig {
        HarvestConfig {
            rng_seed: Some(7),
            ..Default::default()
        }
    }

    fn alice() -> ActorId {
        ActorId::new("alice")
    }

    /// Place a node, bring alice online and point her at it.
    fn setup_node(h: &Harness, pos: BlockPos, category: &str) -> Target {
        h.world.place(pos, category);
        h.world.join(&alice());
        h.world.aim(&alice(), pos);
        Target::new(pos, category)
    }

    fn started_id(outcome: BeginOutcome) -> AnimationId {
        match outcome {
            BeginOutcome::Started { animation_id, .. } => animation_id,
            other => panic!("expected Started, got {:?}", other),
        }
    }

    #[derive(Default)]
    struct Collected {
        harvested: Vec<NodeHarvested>,
        cancelled: Vec<OperationCancelled>,
    }

    impl Collected {
        fn absorb(&mut self, events: TickEvents) {
            self.harvested.extend(events.harvested);
            self.cancelled.extend(events.cancelled);
        }
    }

    /// Tick `n` times, sending a continued-action signal before each tick.
    fn run_swinging(h: &mut Harness, actor: &ActorId, n: u64) -> Collected {
        let mut out = Collected::default();
        for _ in 0..n {
            h.svc.on_continued_action(actor);
            out.absorb(h.svc.tick());
        }
        out
    }

    fn run_idle(h: &mut Harness, n: u64) -> Collected {
        let mut out = Collected::default();
        for _ in 0..n {
            out.absorb(h.svc.tick());
        }
        out
    }

    // -----------------------------------------------------------------------
    // End-to-end completion
    // -----------------------------------------------------------------------

    #[test]
    fn completes_after_exact_duration_with_continuous_liveness() {
        let mut h = make_harness(seeded_config());
        let pos = BlockPos::new(0, 12, 0);
        let target = setup_node(&h, pos, "obsidian");
        h.world
            .set_drops("obsidian", vec![ItemStack::new("obsidian", 1)]);
        h.stats.set_speed(&alice(), 1.0);
        h.stats
            .set_yield_multiplier(&alice(), ResourceFamily::Mining, 100.0);

        let outcome = h.svc.begin_interaction(&alice(), target.clone());
        assert!(matches!(
            outcome,
            BeginOutcome::Started {
                total_ticks: 600,
                replaced: None,
                ..
            }
        ));

        let early = run_swinging(&mut h, &alice(), 599);
        assert!(early.harvested.is_empty());
        assert!(early.cancelled.is_empty());
        assert!(h.world.target_exists(&target));
        assert!(h.svc.has_operation(&alice()));

        h.svc.on_continued_action(&alice());
        let last = h.svc.tick();
        assert_eq!(last.tick, 600);
        assert_eq!(last.harvested.len(), 1);

        let harvested = &last.harvested[0];
        assert_eq!(harvested.target, target);
        assert_eq!(harvested.factor, 2);
        assert_eq!(harvested.drops, vec![ItemStack::new("obsidian", 2)]);
        assert_eq!(harvested.family, ResourceFamily::Mining);

        assert!(!h.world.target_exists(&target));
        assert!(!h.svc.has_operation(&alice()));
        assert!(!h.svc.is_liveness_tracked(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 0);
        assert_eq!(h.svc.stats().completed, 1);
    }

    #[test]
    fn speed_stat_shortens_duration() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(1, 12, 0), "obsidian");
        h.stats.set_speed(&alice(), 2.0);

        let outcome = h.svc.begin_interaction(&alice(), target);
        assert!(matches!(
            outcome,
            BeginOutcome::Started {
                total_ticks: 300,
                ..
            }
        ));

        let out = run_swinging(&mut h, &alice(), 300);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(out.harvested[0].tick, 300);
    }

    #[test]
    fn near_zero_speed_does_not_break_the_scheduler() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        h.stats.set_speed(&alice(), 1e-20);
        h.svc.tick();

        let outcome = h.svc.begin_interaction(&alice(), target.clone());
        assert!(matches!(
            outcome,
            BeginOutcome::Started {
                total_ticks: MAX_DURATION_TICKS,
                ..
            }
        ));

        let out = run_swinging(&mut h, &alice(), 50);
        assert!(out.harvested.is_empty());
        assert!(out.cancelled.is_empty());
        assert!(h.world.target_exists(&target));
        assert!(h.svc.has_operation(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 3);
    }

    #[test]
    fn unknown_category_uses_default_duration() {
        let mut config = seeded_config();
        config.default_duration_ticks = 25;
        let mut h = make_harness(config);
        let target = setup_node(&h, BlockPos::new(0, 0, 0), "strange_fungus_block");

        h.svc.begin_interaction(&alice(), target.clone());
        let out = run_swinging(&mut h, &alice(), 25);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(
            out.harvested[0].drops,
            vec![ItemStack::new("strange_fungus_block", 1)]
        );
    }

    #[test]
    fn yield_uses_the_family_multiplier() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(2, 64, 2), "oak_log");
        h.stats
            .set_yield_multiplier(&alice(), ResourceFamily::Woodcutting, 200.0);
        h.stats
            .set_yield_multiplier(&alice(), ResourceFamily::Mining, 900.0);

        h.svc.begin_interaction(&alice(), target);
        let out = run_swinging(&mut h, &alice(), 60);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(out.harvested[0].family, ResourceFamily::Woodcutting);
        assert_eq!(out.harvested[0].factor, 3);
        assert_eq!(out.harvested[0].drops, vec![ItemStack::new("oak_log", 3)]);
    }

    // -----------------------------------------------------------------------
    // Liveness cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn stopping_signals_cancels_without_yield() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let timeout = h.svc.config().liveness_timeout_ticks;

        h.svc.begin_interaction(&alice(), target.clone());
        let mut out = run_swinging(&mut h, &alice(), 50);
        assert!(h.svc.has_operation(&alice()));

        let rest = run_idle(&mut h, timeout);
        out.harvested.extend(rest.harvested);
        out.cancelled.extend(rest.cancelled);

        assert!(out.harvested.is_empty());
        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::Stale);
        assert!(h.world.target_exists(&target));
        assert!(!h.svc.has_operation(&alice()));
        assert!(!h.svc.is_liveness_tracked(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 0);
    }

    #[test]
    fn stale_operation_cancelled_on_the_timeout_tick() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let timeout = h.svc.config().liveness_timeout_ticks;

        h.svc.begin_interaction(&alice(), target);
        let before = run_idle(&mut h, timeout - 1);
        assert!(before.cancelled.is_empty());

        let events = h.svc.tick();
        assert_eq!(events.tick, timeout);
        assert_eq!(events.cancelled.len(), 1);
        assert_eq!(events.cancelled[0].reason, CancelReason::Stale);
    }

    #[test]
    fn signals_without_operation_are_ignored() {
        let mut h = make_harness(seeded_config());
        assert!(!h.svc.on_continued_action(&alice()));
        assert!(!h.svc.is_liveness_tracked(&alice()));
    }

    // -----------------------------------------------------------------------
    // Monitor checks
    // -----------------------------------------------------------------------

    #[test]
    fn looking_away_cancels() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        h.world.place(BlockPos::new(5, 12, 0), "stone");

        h.svc.begin_interaction(&alice(), target.clone());
        run_swinging(&mut h, &alice(), 5);
        h.world.aim(&alice(), BlockPos::new(5, 12, 0));

        let out = run_swinging(&mut h, &alice(), 1);
        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::AimChanged);
        assert!(h.world.target_exists(&target));
    }

    #[test]
    fn removed_target_cancels() {
        let mut h = make_harness(seeded_config());
        let pos = BlockPos::new(0, 12, 0);
        let target = setup_node(&h, pos, "stone");

        h.svc.begin_interaction(&alice(), target);
        run_swinging(&mut h, &alice(), 3);
        h.world.clear(pos);

        let out = run_swinging(&mut h, &alice(), 1);
        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::TargetVanished);
        assert!(out.harvested.is_empty());
    }

    #[test]
    fn changed_target_type_cancels() {
        let mut h = make_harness(seeded_config());
        let pos = BlockPos::new(0, 12, 0);
        let target = setup_node(&h, pos, "stone");

        h.svc.begin_interaction(&alice(), target);
        run_swinging(&mut h, &alice(), 3);
        h.world.place(pos, "cobblestone");

        let out = run_swinging(&mut h, &alice(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::TargetVanished);
    }

    #[test]
    fn going_offline_cancels() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");

        h.svc.begin_interaction(&alice(), target);
        h.world.leave(&alice());

        let out = run_swinging(&mut h, &alice(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::Disconnected);
    }

    #[test]
    fn node_removed_between_monitor_checks_is_not_harvested() {
        let mut config = seeded_config();
        config.monitor_interval_ticks = 4;
        let mut h = make_harness(config);
        let pos = BlockPos::new(0, 12, 0);
        let target = setup_node(&h, pos, "dirt");

        h.svc.begin_interaction(&alice(), target);
        let mut out = run_swinging(&mut h, &alice(), 13);
        h.world.clear(pos);
        let rest = run_swinging(&mut h, &alice(), 2);
        out.harvested.extend(rest.harvested);
        out.cancelled.extend(rest.cancelled);

        assert!(out.harvested.is_empty());
        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::TargetVanished);
        assert_eq!(out.cancelled[0].tick, 15);
        assert_eq!(h.svc.stats().completed, 0);
        assert!(!h.svc.is_cooling_down(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 0);
    }

    #[test]
    fn stale_actor_between_monitor_checks_is_not_harvested() {
        let mut config = seeded_config();
        config.monitor_interval_ticks = 4;
        let mut h = make_harness(config);
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "dirt");

        h.svc.begin_interaction(&alice(), target.clone());
        let mut out = run_swinging(&mut h, &alice(), 10);
        let rest = run_idle(&mut h, 5);
        out.harvested.extend(rest.harvested);
        out.cancelled.extend(rest.cancelled);

        assert!(out.harvested.is_empty());
        assert_eq!(out.cancelled.len(), 1);
        assert_eq!(out.cancelled[0].reason, CancelReason::Stale);
        assert_eq!(out.cancelled[0].tick, 15);
        assert!(h.world.target_exists(&target));
    }

    // -----------------------------------------------------------------------
    // Registry contract through the service
    // -----------------------------------------------------------------------

    #[test]
    fn repeated_begin_is_idempotent() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");

        let first = started_id(h.svc.begin_interaction(&alice(), target.clone()));
        let pending = h.svc.stats().pending_tasks;

        assert_eq!(
            h.svc.begin_interaction(&alice(), target.clone()),
            BeginOutcome::Duplicate
        );
        assert_eq!(h.svc.stats().active_operations, 1);
        assert_eq!(h.svc.stats().pending_tasks, pending);
        assert_eq!(
            h.svc.operation(&alice()).map(|op| op.animation_id),
            Some(first)
        );
    }

    #[test]
    fn switching_targets_cancels_previous_first() {
        let mut h = make_harness(seeded_config());
        let first_target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        let second_pos = BlockPos::new(1, 12, 0);
        h.world.place(second_pos, "iron_ore");
        let second_target = Target::new(second_pos, "iron_ore");

        let first = started_id(h.svc.begin_interaction(&alice(), first_target.clone()));
        run_swinging(&mut h, &alice(), 3);
        h.sink.take();

        h.world.aim(&alice(), second_pos);
        let outcome = h.svc.begin_interaction(&alice(), second_target.clone());
        let second = match outcome {
            BeginOutcome::Started {
                animation_id,
                replaced,
                ..
            } => {
                assert_eq!(replaced, Some(first));
                animation_id
            }
            other => panic!("expected Started, got {:?}", other),
        };

        // The old animation was cleared before anything of the new one.
        let log = h.sink.snapshot();
        assert!(matches!(
            log.first(),
            Some(Broadcast::Cleared(c)) if c.animation_id == first
        ));

        assert_eq!(h.svc.stats().active_operations, 1);
        assert_eq!(
            h.svc.operation(&alice()).map(|op| op.target),
            Some(second_target)
        );

        let events = h.svc.tick();
        assert_eq!(events.cancelled.len(), 1);
        assert_eq!(events.cancelled[0].animation_id, first);
        assert_eq!(events.cancelled[0].reason, CancelReason::Superseded);
        assert!(h.svc.has_operation(&alice()));

        let out = run_swinging(&mut h, &alice(), 60);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(out.harvested[0].animation_id, second);
        assert!(h.world.target_exists(&first_target));
    }

    #[test]
    fn begin_on_missing_node_creates_nothing() {
        let mut h = make_harness(seeded_config());
        h.world.join(&alice());
        let outcome = h
            .svc
            .begin_interaction(&alice(), Target::new(BlockPos::new(9, 9, 9), "stone"));
        assert_eq!(outcome, BeginOutcome::TargetMissing);
        assert!(!h.svc.has_operation(&alice()));
        assert!(!h.svc.is_liveness_tracked(&alice()));
    }

    // -----------------------------------------------------------------------
    // Gate checks
    // -----------------------------------------------------------------------

    #[test]
    fn gate_denial_messages_actor_and_creates_nothing() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "diamond_ore");
        h.gate.require("diamond_ore", ResourceFamily::Mining, 50);

        assert_eq!(
            h.svc.begin_interaction(&alice(), target.clone()),
            BeginOutcome::Denied
        );
        assert!(!h.svc.has_operation(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 0);
        assert_eq!(
            h.sink.notices_for(&alice()),
            vec!["You need level 50 Mining to break diamond_ore.".to_string()]
        );

        h.gate.set_level(&alice(), ResourceFamily::Mining, 50);
        assert!(h.gate.can_interact(&alice(), &target.category));
        started_id(h.svc.begin_interaction(&alice(), target));
    }

    // -----------------------------------------------------------------------
    // Re-entry cooldown
    // -----------------------------------------------------------------------

    #[test]
    fn trailing_begin_after_completion_is_ignored() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "dirt");
        let next_pos = BlockPos::new(0, 11, 0);
        h.world.place(next_pos, "dirt");
        let next = Target::new(next_pos, "dirt");

        h.svc.begin_interaction(&alice(), target.clone());
        let out = run_swinging(&mut h, &alice(), 15);
        assert_eq!(out.harvested.len(), 1);
        assert!(h.svc.is_cooling_down(&alice()));

        assert_eq!(
            h.svc.begin_interaction(&alice(), target),
            BeginOutcome::CoolingDown
        );
        assert_eq!(
            h.svc.begin_interaction(&alice(), next.clone()),
            BeginOutcome::CoolingDown
        );

        let window = h.svc.config().reentry_cooldown_ticks;
        run_idle(&mut h, window);
        assert!(!h.svc.is_cooling_down(&alice()));
        h.world.aim(&alice(), next_pos);
        started_id(h.svc.begin_interaction(&alice(), next));
    }

    // -----------------------------------------------------------------------
    // Visual loop
    // -----------------------------------------------------------------------

    #[test]
    fn stages_advance_on_their_own_cadence() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let id = started_id(h.svc.begin_interaction(&alice(), target));

        run_swinging(&mut h, &alice(), 59);
        assert!(h.sink.progress_stages(id).is_empty());
        run_swinging(&mut h, &alice(), 1);
        assert_eq!(h.sink.progress_stages(id), vec![1]);

        run_swinging(&mut h, &alice(), 540);
        assert_eq!(h.sink.progress_stages(id), (1..=10).collect::<Vec<u8>>());
        assert!(matches!(
            h.sink.snapshot().last(),
            Some(Broadcast::Cleared(c)) if c.animation_id == id
        ));
    }

    #[test]
    fn fast_visual_pace_caps_stages_before_completion() {
        let mut config = seeded_config();
        config.visual.pace = 0.5;
        let mut h = make_harness(config);
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let id = started_id(h.svc.begin_interaction(&alice(), target));

        run_swinging(&mut h, &alice(), 300);
        assert_eq!(h.sink.progress_stages(id).len(), 10);
        assert!(h.svc.has_operation(&alice()));
        assert_eq!(h.svc.operation(&alice()).map(|op| op.stage), Some(10));

        let out = run_swinging(&mut h, &alice(), 300);
        assert_eq!(h.sink.progress_stages(id).len(), 10);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(out.harvested[0].tick, 600);
    }

    #[test]
    fn slow_visual_pace_never_delays_completion() {
        let mut config = seeded_config();
        config.visual.pace = 2.0;
        let mut h = make_harness(config);
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let id = started_id(h.svc.begin_interaction(&alice(), target));

        let out = run_swinging(&mut h, &alice(), 600);
        assert_eq!(out.harvested.len(), 1);
        assert_eq!(h.sink.progress_stages(id), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cancelled_operation_stops_emitting() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        let id = started_id(h.svc.begin_interaction(&alice(), target));

        run_swinging(&mut h, &alice(), 130);
        assert_eq!(h.sink.progress_stages(id), vec![1, 2]);
        assert!(h.svc.abort(&alice()));

        run_idle(&mut h, 200);
        assert_eq!(h.sink.progress_stages(id), vec![1, 2]);
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    #[test]
    fn teardown_is_idempotent() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        let id = started_id(h.svc.begin_interaction(&alice(), target));

        assert!(h.svc.abort(&alice()));
        assert!(!h.svc.abort(&alice()));
        h.svc.actor_disconnected(&alice());

        let clears = h
            .sink
            .snapshot()
            .into_iter()
            .filter(|b| matches!(b, Broadcast::Cleared(c) if c.animation_id == id))
            .count();
        assert_eq!(clears, 1);
        assert_eq!(h.svc.stats().cancelled, 1);

        let events = h.svc.tick();
        assert_eq!(events.cancelled.len(), 1);
        assert_eq!(events.cancelled[0].reason, CancelReason::Aborted);
    }

    #[test]
    fn abort_after_completion_does_nothing() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "dirt");
        h.svc.begin_interaction(&alice(), target);
        run_swinging(&mut h, &alice(), 15);

        assert!(!h.svc.abort(&alice()));
        assert_eq!(h.svc.stats().completed, 1);
        assert_eq!(h.svc.stats().cancelled, 0);
    }

    #[test]
    fn disconnect_clears_everything() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        h.svc.begin_interaction(&alice(), target);

        h.svc.actor_disconnected(&alice());
        assert!(!h.svc.has_operation(&alice()));
        assert!(!h.svc.is_liveness_tracked(&alice()));
        assert_eq!(h.svc.stats().pending_tasks, 0);

        let events = h.svc.tick();
        assert_eq!(events.cancelled[0].reason, CancelReason::Disconnected);
    }

    #[test]
    fn shutdown_cancels_all_operations() {
        let mut h = make_harness(seeded_config());
        let bob = ActorId::new("bob");
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "stone");
        let other_pos = BlockPos::new(3, 12, 0);
        h.world.place(other_pos, "stone");
        h.world.join(&bob);
        h.world.aim(&bob, other_pos);

        h.svc.begin_interaction(&alice(), target);
        h.svc
            .begin_interaction(&bob, Target::new(other_pos, "stone"));

        let cancelled = h.svc.shutdown();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled
            .iter()
            .all(|c| c.reason == CancelReason::Shutdown));
        assert_eq!(h.svc.stats().active_operations, 0);
        assert_eq!(h.svc.stats().pending_tasks, 0);
    }

    #[test]
    fn operation_view_reports_progress() {
        let mut h = make_harness(seeded_config());
        let target = setup_node(&h, BlockPos::new(0, 12, 0), "obsidian");
        h.svc.begin_interaction(&alice(), target.clone());
        run_swinging(&mut h, &alice(), 120);

        let view = h.svc.operation(&alice()).expect("active operation");
        assert_eq!(view.target, target);
        assert_eq!(view.stage, 2);
        assert_eq!(view.stage_count, 10);
        assert_eq!(view.completes_at, 600);
        assert_eq!(view.state, OperationState::Active);
        assert_eq!(h.svc.operations().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Best-effort delivery
    // -----------------------------------------------------------------------

    struct FailingSink;

    impl ProgressSink for FailingSink {
        fn emit_progress(
            &self,
            _actor: &ActorId,
            _animation_id: AnimationId,
            _target: &Target,
            _stage: u8,
            _stage_count: u8,
        ) -> Result<(), DeliveryError> {
            Err(DeliveryError::NoSubscribers("harvest.progress".into()))
        }

        fn clear_progress(
            &self,
            _actor: &ActorId,
            _animation_id: AnimationId,
            _target: &Target,
        ) -> Result<(), DeliveryError> {
            Err(DeliveryError::NoSubscribers("harvest.progress.cleared".into()))
        }

        fn notify(&self, _actor: &ActorId, _message: &str) -> Result<(), DeliveryError> {
            let source = serde_json::from_str::<u8>("not json").unwrap_err();
            Err(DeliveryError::Encode {
                subject: "harvest.notice".into(),
                source,
            })
        }
    }

    #[test]
    fn delivery_failures_do_not_affect_operations() {
        let world = Arc::new(GridWorld::new());
        let collab = Collaborators {
            world: world.clone(),
            stats: Arc::new(StatTable::new()),
            gate: Arc::new(LevelGate::new()),
            sink: Arc::new(FailingSink),
        };
        let config = seeded_config();
        let durations = DurationTable::from_config(&config);
        let mut svc = HarvestService::new(config, durations, collab).expect("valid config");

        let pos = BlockPos::new(0, 12, 0);
        world.place(pos, "stone");
        world.join(&alice());
        world.aim(&alice(), pos);
        let target = Target::new(pos, "stone");

        svc.begin_interaction(&alice(), target.clone());
        let mut harvested = 0;
        for _ in 0..30 {
            svc.on_continued_action(&alice());
            harvested += svc.tick().harvested.len();
        }
        assert_eq!(harvested, 1);
        assert!(!world.target_exists(&target));

        // Denial notice fails to encode; the begin is still refused cleanly.
        let gated = BlockPos::new(1, 12, 0);
        world.place(gated, "diamond_ore");
        world.aim(&alice(), gated);
        let gate = LevelGate::new();
        gate.require("diamond_ore", ResourceFamily::Mining, 50);
        let collab = Collaborators {
            world: world.clone(),
            stats: Arc::new(StatTable::new()),
            gate: Arc::new(gate),
            sink: Arc::new(FailingSink),
        };
        let config = seeded_config();
        let durations = DurationTable::from_config(&config);
        let mut gated_svc = HarvestService::new(config, durations, collab).expect("valid config");
        assert_eq!(
            gated_svc.begin_interaction(&alice(), Target::new(gated, "diamond_ore")),
            BeginOutcome::Denied
        );
        assert!(!gated_svc.has_operation(&alice()));
    }

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&HarvestConfig::default()).is_ok());
    }

    #[test]
    fn too_short_liveness_timeout_is_rejected() {
        let config = HarvestConfig {
            liveness_timeout_ticks: 1,
            ..Default::default()
        };
        assert!(matches!(
            validate(&config),
            Err(HarvestError::InvalidConfig(_))
        ));

        let durations = DurationTable::from_config(&config);
        let collab = Collaborators {
            world: Arc::new(GridWorld::new()),
            stats: Arc::new(StatTable::new()),
            gate: Arc::new(LevelGate::new()),
            sink: Arc::new(RecordingSink::new()),
        };
        assert!(HarvestService::new(config, durations, collab).is_err());
    }

    #[test]
    fn zero_pace_is_rejected() {
        let mut config = HarvestConfig::default();
        config.visual.pace = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn toml_config_overrides_defaults() {
        let config = load_config_str(
            r#"
            liveness_timeout_ticks = 5
            rng_seed = 99

            [visual]
            stage_count = 8

            [durations.reinforced_deepslate]
            ticks = 1100
            family = "mining"
            "#,
        )
        .expect("config loads");

        assert_eq!(config.liveness_timeout_ticks, 5);
        assert_eq!(config.rng_seed, Some(99));
        assert_eq!(config.visual.stage_count, 8);
        assert_eq!(config.visual.pace, 1.0);
        assert_eq!(config.monitor_interval_ticks, 1);

        let entry = &config.durations["reinforced_deepslate"];
        assert_eq!(entry.ticks, 1100);
        assert_eq!(entry.family, ResourceFamily::Mining);
    }

    #[test]
    fn toml_config_is_validated() {
        let err = load_config_str("liveness_timeout_ticks = 0").unwrap_err();
        assert!(matches!(err, HarvestError::InvalidConfig(_)));
    }
}
