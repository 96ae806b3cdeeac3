use std::sync::Arc;

use vb_core::sync::{BroadcastHub, MemorySlotStore, SyncChannel, DEBOUNCE_DELAY_MS};
use vb_core::timing::{ManualClock, Timers};
use vb_core::{Controller, Overlay, TeamSide, AUTO_ADVANCE_DELAY_MS};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🏐 Volleyball Scoreboard Sync Demo");

    // One simulated clock drives every timer in both contexts.
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let timers = Timers::new(clock.clone());
    let slot = MemorySlotStore::new();
    let hub = BroadcastHub::new();

    let channel = |timers: &Timers| {
        SyncChannel::new(Arc::new(slot.clone()), &hub, timers.clone())
    };

    // Test 1: controller startup and first publish
    println!("\n🧪 Test 1: Controller startup");
    let controller = Controller::new(channel(&timers), timers.clone());
    let overlay = Overlay::new(channel(&timers), timers.clone());
    println!("✅ Controller publishing, overlay subscribed");

    // Test 2: scoring propagates after the debounce window
    println!("\n🧪 Test 2: Scoring propagation");
    controller.score_point(TeamSide::Local);
    controller.score_point(TeamSide::Local);
    controller.score_point(TeamSide::Visitor);
    clock.advance(DEBOUNCE_DELAY_MS);
    timers.run_due();

    let set = overlay.current_set_info();
    println!("✅ Overlay shows {}-{} in set {}", set.local_score, set.visitor_score, set.set);
    if set.local_score != 2 || set.visitor_score != 1 {
        return Err("overlay out of sync after scoring".into());
    }

    // Test 3: set win pauses, then auto-advances
    println!("\n🧪 Test 3: Set win and auto-advance");
    for _ in 0..23 {
        controller.score_point(TeamSide::Local);
    }
    let state = controller.state();
    if state.local.sets != 1 || state.current_set != 1 {
        return Err("set win should be recorded before the pause ends".into());
    }
    println!("✅ Set 1 won ({} sets), holding for the pause", state.local.sets);

    clock.advance(AUTO_ADVANCE_DELAY_MS);
    timers.run_due();
    clock.advance(DEBOUNCE_DELAY_MS);
    timers.run_due();

    if controller.state().current_set != 2 {
        return Err("auto-advance did not move to set 2".into());
    }
    if overlay.current_set_info().set != 2 {
        return Err("overlay did not follow the auto-advance".into());
    }
    println!("✅ Auto-advanced to set {}", overlay.current_set_info().set);

    // Test 4: connectivity and serve projection
    println!("\n🧪 Test 4: Status projections");
    let serve = overlay.serve_info();
    println!("✅ Serving: {} (player #{})", serve.team_name, serve.player);
    let stats = overlay.connection_stats();
    println!("✅ Connection: {:?}, last update {:?}", stats.status, stats.last_update);

    // Test 5: clean shutdown releases every timer
    println!("\n🧪 Test 5: Shutdown");
    controller.shutdown();
    overlay.shutdown();
    if timers.pending() != 0 {
        return Err(format!("{} timers still pending after shutdown", timers.pending()).into());
    }
    println!("✅ All timers released");

    println!("\n🎉 Demo complete");
    Ok(())
}
