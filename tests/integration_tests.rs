//! Integration tests for stepper-lookahead.
//!
//! These drive the foreground controller and the step engine together, the
//! way firmware interleaves its main loop with the step timer.

use std::sync::atomic::{AtomicBool, Ordering};

use stepper_lookahead::config::{AxisConfig, MachineConfig};
use stepper_lookahead::error::EnqueueError;
use stepper_lookahead::{MachineState, MotionController, MotionCore, MotionRequest, StepperEngine};

// =============================================================================
// Helpers
// =============================================================================

fn config() -> MachineConfig {
    // 10 steps/mm keeps runs short; 100 mm/s max, 500 mm/s²
    let axis = AxisConfig::new(10.0, 6000.0, 500.0);
    MachineConfig::with_axes(&[axis.clone(), axis.clone(), axis])
}

fn line(x: f32, y: f32, z: f32) -> MotionRequest<3> {
    MotionRequest::new([x, y, z], 1800.0)
}

/// Bring a cold controller to IDLE at the origin.
fn ready<const N: usize>(controller: &mut MotionController<'_, 3, N>) {
    assert_eq!(controller.execute_runtime(), MachineState::PositionLost);
    controller.set_position([0.0; 3]).unwrap();
    assert_eq!(controller.current_state(), MachineState::Idle);
}

/// Interleave engine ticks with foreground polls until the cycle ends.
/// Returns the pulses emitted per axis.
fn run_to_idle<const N: usize>(
    controller: &mut MotionController<'_, 3, N>,
    engine: &mut StepperEngine<'_, 3, N>,
    max_ticks: usize,
) -> [u32; 3] {
    let mut pulses = [0u32; 3];
    for _ in 0..max_ticks {
        let out = engine.tick();
        count_pulses(&mut pulses, out.pulses.iter().copied());
        let state = controller.execute_runtime();
        if state == MachineState::Idle && controller.cycle_complete() {
            return pulses;
        }
    }
    panic!("cycle did not complete within {max_ticks} ticks");
}

fn count_pulses(pulses: &mut [u32; 3], masks: impl Iterator<Item = u8>) {
    for mask in masks {
        for (axis, count) in pulses.iter_mut().enumerate() {
            if mask & (1 << axis) != 0 {
                *count += 1;
            }
        }
    }
}

// =============================================================================
// Round trip: retired steps equal planned steps
// =============================================================================

#[test]
fn test_moves_end_at_planned_position() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(10.0, 0.0, 0.0)).unwrap();
    controller.enqueue(&line(10.0, 5.0, 0.0)).unwrap();
    controller.enqueue(&line(2.5, -3.0, 1.0)).unwrap();
    assert_eq!(controller.current_state(), MachineState::Run);

    let pulses = run_to_idle(&mut controller, &mut engine, 2_000_000);

    // |10| + |-7.5| on X, |5| + |-8| on Y, |1| on Z at 10 steps/mm
    assert_eq!(pulses, [175, 130, 10]);
    assert_eq!(controller.current_position_steps(), [25, -30, 10]);
    assert_eq!(controller.current_position(), [2.5, -3.0, 1.0]);
    assert_eq!(controller.buffered(), 0);
}

#[test]
fn test_position_snapshots_move_monotonically() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(20.0, 0.0, 0.0)).unwrap();

    let mut last = 0;
    for _ in 0..2_000_000 {
        engine.tick();
        let x = controller.current_position_steps()[0];
        assert!(x >= last);
        last = x;
        if controller.execute_runtime() == MachineState::Idle {
            break;
        }
    }
    assert_eq!(last, 200);
}

// =============================================================================
// Feed-hold
// =============================================================================

#[test]
fn test_hold_resume_loses_no_steps() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(30.0, 10.0, 0.0)).unwrap();
    let mut pulses = [0u32; 3];
    for _ in 0..3_000 {
        count_pulses(&mut pulses, engine.tick().pulses.iter().copied());
        controller.execute_runtime();
    }
    assert!(pulses[0] > 0 && pulses[0] < 300);

    controller.request_hold();
    // Engine freezes before the foreground has even seen the request
    assert!(engine.tick().is_empty());
    assert_eq!(controller.execute_runtime(), MachineState::Hold);

    let frozen = controller.current_position_steps();
    let cursor_before = engine.cursor().map(|c| c.completed());
    for _ in 0..10_000 {
        assert!(engine.tick().is_empty());
        controller.execute_runtime();
    }
    assert_eq!(controller.current_position_steps(), frozen);
    assert_eq!(engine.cursor().map(|c| c.completed()), cursor_before);

    controller.request_resume();
    assert_eq!(controller.execute_runtime(), MachineState::Run);
    let rest = run_to_idle(&mut controller, &mut engine, 2_000_000);

    for axis in 0..3 {
        pulses[axis] += rest[axis];
    }
    assert_eq!(pulses, [300, 100, 0]);
    assert_eq!(controller.current_position_steps(), [300, 100, 0]);
}

// =============================================================================
// Hard limit
// =============================================================================

#[test]
fn test_hard_limit_stops_within_one_tick() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(50.0, 0.0, 0.0)).unwrap();
    controller.enqueue(&line(50.0, 50.0, 0.0)).unwrap();
    for _ in 0..5_000 {
        engine.tick();
        controller.execute_runtime();
    }
    let buffered = controller.buffered();
    assert_eq!(buffered, 2);

    controller.limit_trigger().trip();

    assert!(engine.tick().is_empty());
    let stopped_at = controller.current_position_steps();
    assert_eq!(controller.execute_runtime(), MachineState::PositionLost);
    assert!(!controller.position_trusted());

    // Buffer kept for inspection; no new motion accepted
    assert_eq!(controller.buffered(), buffered);
    assert_eq!(
        controller.enqueue(&line(0.0, 0.0, 0.0)),
        Err(EnqueueError::Locked(MachineState::PositionLost))
    );
    for _ in 0..1_000 {
        assert!(engine.tick().is_empty());
        controller.execute_runtime();
    }
    assert_eq!(controller.current_position_steps(), stopped_at);

    // Explicit abort clears everything
    controller.request_abort();
    engine.tick();
    assert_eq!(controller.execute_runtime(), MachineState::PositionLost);
    assert_eq!(controller.buffered(), 0);
    assert_eq!(controller.current_position_steps(), stopped_at);

    controller.set_position([0.0; 3]).unwrap();
    controller.enqueue(&line(1.0, 0.0, 0.0)).unwrap();
    run_to_idle(&mut controller, &mut engine, 1_000_000);
    assert_eq!(controller.current_position_steps(), [10, 0, 0]);
}

#[test]
fn test_abort_waits_for_engine_to_park() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(40.0, 0.0, 0.0)).unwrap();
    for _ in 0..2_000 {
        engine.tick();
    }

    controller.request_abort();
    // Engine still holds the block: reset is deferred
    assert_eq!(controller.execute_runtime(), MachineState::Run);
    assert_eq!(controller.buffered(), 1);

    engine.tick();
    assert!(engine.cursor().is_none());
    assert_eq!(controller.execute_runtime(), MachineState::PositionLost);
    assert_eq!(controller.buffered(), 0);
}

#[test]
fn test_abort_after_cycle_keeps_position() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(1.0, 0.0, 0.0)).unwrap();
    for _ in 0..1_000_000 {
        engine.tick();
        if controller.cycle_complete() {
            break;
        }
    }
    assert!(controller.cycle_complete());
    assert_eq!(controller.current_state(), MachineState::Run);

    controller.request_abort();
    assert_eq!(controller.execute_runtime(), MachineState::Idle);
    assert!(controller.position_trusted());
    assert_eq!(controller.current_position_steps(), [10, 0, 0]);
}

#[test]
fn test_abort_during_hold_keeps_position() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(40.0, 0.0, 0.0)).unwrap();
    for _ in 0..2_000 {
        engine.tick();
        controller.execute_runtime();
    }
    controller.request_hold();
    engine.tick();
    assert_eq!(controller.execute_runtime(), MachineState::Hold);
    let held_at = controller.current_position_steps();

    controller.request_abort();
    assert_eq!(controller.execute_runtime(), MachineState::Hold);
    engine.tick();
    assert!(engine.cursor().is_none());
    assert_eq!(controller.execute_runtime(), MachineState::Idle);
    assert!(controller.position_trusted());
    assert_eq!(controller.buffered(), 0);
    assert_eq!(controller.current_position_steps(), held_at);
}

// =============================================================================
// Homing
// =============================================================================

#[test]
fn test_homing_switch_ends_homing_move() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    controller.execute_runtime();

    controller.begin_homing().unwrap();
    controller.enqueue(&line(-100.0, 0.0, 0.0)).unwrap();
    assert_eq!(controller.current_state(), MachineState::Homing);

    let mut pulses = [0u32; 3];
    for _ in 0..3_000 {
        count_pulses(&mut pulses, engine.tick().pulses.iter().copied());
        controller.execute_runtime();
    }
    assert!(pulses[0] > 0);

    controller.limit_trigger().trip();
    assert!(engine.tick().is_empty());
    assert_eq!(controller.execute_runtime(), MachineState::Homing);
    assert_eq!(controller.buffered(), 0);

    controller.finish_homing([0.0; 3]).unwrap();
    assert_eq!(controller.current_state(), MachineState::Idle);
    assert_eq!(controller.current_position_steps(), [0, 0, 0]);
    assert!(controller.position_trusted());
}

// =============================================================================
// Buffer capacity
// =============================================================================

#[test]
fn test_full_buffer_rejects_without_mutation() {
    let mut core = MotionCore::<3, 4>::new();
    let (mut controller, _engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    for i in 1..=4 {
        controller.enqueue(&line(i as f32, 0.0, 0.0)).unwrap();
    }
    let before = controller.blocks();

    assert_eq!(
        controller.enqueue(&line(10.0, 0.0, 0.0)),
        Err(EnqueueError::BufferFull)
    );
    assert_eq!(controller.blocks(), before);
}

#[test]
fn test_unreachable_targets_are_rejected() {
    let mut core = MotionCore::<3, 4>::new();
    let (mut controller, _engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(1.0, 0.0, 0.0)).unwrap();
    let before = controller.blocks();

    for target in [f32::NAN, f32::INFINITY, 1e30] {
        assert_eq!(
            controller.enqueue(&line(target, 0.0, 0.0)),
            Err(EnqueueError::TargetOutOfRange)
        );
    }
    assert_eq!(controller.blocks(), before);
    assert_eq!(controller.current_state(), MachineState::Run);
}

// =============================================================================
// Profiles and junctions
// =============================================================================

#[test]
fn test_short_block_is_triangle_long_block_has_plateau() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, _engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    // 1 mm cannot reach 30 mm/s at 500 mm/s² (needs 0.9 mm each way)
    controller.enqueue(&line(1.0, 0.0, 0.0)).unwrap();
    let short = controller.blocks()[0].trapezoid;
    assert!(!short.has_plateau());
    assert_eq!(short.accelerate_until, 5);
    assert_eq!(short.decelerate_after, 5);

    controller.request_abort();
    controller.execute_runtime();
    controller.set_position([0.0; 3]).unwrap();

    controller.enqueue(&line(100.0, 0.0, 0.0)).unwrap();
    let long = controller.blocks()[0].trapezoid;
    assert!(long.has_plateau());
    assert!(long.accelerate_until > 0);
    assert!(long.decelerate_after < 1000);
    // Symmetric ramps, up to rounding of the step boundaries
    let ramp_down = 1000 - long.decelerate_after;
    assert!(long.accelerate_until.abs_diff(ramp_down) <= 1);
}

#[test]
fn test_collinear_and_reversing_junctions() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, _engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enqueue(&line(20.0, 0.0, 0.0)).unwrap();
    controller.enqueue(&line(40.0, 0.0, 0.0)).unwrap();
    controller.enqueue(&line(0.0, 0.0, 0.0)).unwrap();

    let blocks = controller.blocks();
    // No stop between the collinear pair
    assert!(blocks[1].entry_speed_sqr > 0.0);
    assert_eq!(blocks[0].exit_speed_sqr, blocks[1].entry_speed_sqr);
    // Full stop at the reversal
    assert_eq!(blocks[2].entry_speed_sqr, 0.0);
    assert_eq!(blocks[1].exit_speed_sqr, 0.0);
}

// =============================================================================
// Check mode
// =============================================================================

#[test]
fn test_check_mode_never_moves() {
    let mut core = MotionCore::<3, 8>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    controller.enter_check_mode().unwrap();
    controller.enqueue(&line(10.0, 10.0, 0.0)).unwrap();
    controller.enqueue(&line(0.0, 10.0, 0.0)).unwrap();
    for _ in 0..1_000 {
        assert!(engine.tick().is_empty());
    }
    assert_eq!(controller.exit_check_mode(), Ok(MachineState::Idle));
    assert_eq!(controller.current_position_steps(), [0, 0, 0]);
}

// =============================================================================
// Concurrency: engine on its own thread
// =============================================================================

#[test]
fn test_engine_thread_and_foreground_agree() {
    let mut core = MotionCore::<3, 4>::new();
    let (mut controller, mut engine) = core.split(&config()).unwrap();
    ready(&mut controller);

    let targets = [
        (5.0, 0.0, 0.0),
        (10.0, 2.0, 0.0),
        (12.0, 8.0, 1.0),
        (6.0, 8.0, 1.0),
        (6.0, 0.5, 0.0),
        (0.0, 0.0, 0.0),
        (3.0, 3.0, 3.0),
        (3.0, -2.0, 3.0),
    ];
    let stop = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Acquire) {
                engine.tick();
            }
        });

        for &(x, y, z) in targets.iter() {
            loop {
                controller.execute_runtime();
                match controller.enqueue(&line(x, y, z)) {
                    Ok(()) => break,
                    Err(EnqueueError::BufferFull) => std::thread::yield_now(),
                    Err(e) => panic!("unexpected rejection: {e}"),
                }
            }
        }
        while !(controller.execute_runtime() == MachineState::Idle && controller.cycle_complete()) {
            assert_ne!(controller.current_state(), MachineState::Alarm);
            std::thread::yield_now();
        }
        stop.store(true, Ordering::Release);
    });

    assert_eq!(controller.current_position_steps(), [30, -20, 30]);
}
