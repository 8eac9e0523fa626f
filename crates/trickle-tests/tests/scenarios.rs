//! Hand-built streaming histories with exact expected balances.
//!
//! Each test sets up senders and receivers at explicit blocks and checks the
//! amounts a receiver can collect and a sender can withdraw afterwards.

use std::io::Write;

use trickle_core::constants::{MAX_AMOUNT, MAX_BLOCK};
use trickle_core::error::PoolError;
use trickle_core::traits::StreamingPool;
use trickle_core::types::{Amount, PoolEvent, SenderUpdate};
use trickle_sim::{Action, Scenario, SimConfig, Simulator};
use trickle_tests::helpers::*;

#[test]
fn reference_stream() {
    let (alice, bob) = (acct(1), acct(2));
    let mut p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 0);

    assert_eq!(p.withdrawable(&alice, 25).unwrap(), amt(750));
    // Blocks 30 and 31 belong to cycle 4, which has not finished.
    assert_eq!(p.collectable(&bob, 31).unwrap(), amt(300));
    assert_eq!(p.collect(&bob, 31).unwrap(), amt(300));
    assert_eq!(p.collect(&bob, 31).unwrap(), Amount::ZERO);
    assert_eq!(p.collect(&bob, 39).unwrap(), Amount::ZERO);
    assert_eq!(p.collect(&bob, 40).unwrap(), amt(100));
    assert_eq!(p.collect(&bob, 1_000).unwrap(), amt(600));
    assert_eq!(p.withdrawable(&alice, 1_000).unwrap(), Amount::ZERO);
}

#[test]
fn funds_become_collectable_after_the_cycle_ends() {
    let (alice, bob) = (acct(1), acct(2));
    let p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 15);

    assert_eq!(p.collectable(&bob, 15).unwrap(), Amount::ZERO);
    assert_eq!(p.collectable(&bob, 19).unwrap(), Amount::ZERO);
    assert_eq!(p.collectable(&bob, 20).unwrap(), amt(50));
    assert_eq!(p.collectable(&bob, 29).unwrap(), amt(50));
    assert_eq!(p.collectable(&bob, 30).unwrap(), amt(150));
}

#[test]
fn rate_is_rounded_down_to_a_multiple_of_the_weight_sum() {
    let (alice, a, b) = (acct(1), acct(2), acct(3));
    let p = streaming_pool(10, alice, 10_000, 10, &[(a, 1), (b, 2)], 0);

    let snapshot = p.sender_snapshot(&alice).unwrap();
    assert_eq!(snapshot.amt_per_block, amt(10));
    assert_eq!(snapshot.effective_amt_per_block, amt(9));
    // 10_000 / 9 = 1111 blocks, 1 unit left over.
    assert_eq!(snapshot.end_block, Some(1_111));

    assert_eq!(p.withdrawable(&alice, 5_000).unwrap(), amt(1));
    assert_eq!(p.collectable(&a, 5_000).unwrap(), amt(3_333));
    assert_eq!(p.collectable(&b, 5_000).unwrap(), amt(6_666));
}

#[test]
fn rate_below_weight_sum_streams_nothing() {
    let (alice, a, b) = (acct(1), acct(2), acct(3));
    let p = streaming_pool(10, alice, 500, 2, &[(a, 2), (b, 1)], 0);

    assert_eq!(p.sender_snapshot(&alice).unwrap().end_block, None);
    assert_eq!(p.withdrawable(&alice, 10_000).unwrap(), amt(500));
    assert_eq!(p.collectable(&a, 10_000).unwrap(), Amount::ZERO);
}

#[test]
fn several_senders_fund_one_receiver() {
    let (alice, carol, bob) = (acct(1), acct(3), acct(2));
    let mut p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 0);
    let update = SenderUpdate {
        top_up: amt(1_000),
        amt_per_block: Some(amt(5)),
        receivers: vec![(bob, 7)],
        ..SenderUpdate::default()
    };
    // Weight 7 and rate 5 round to zero per weight: raise the rate instead.
    p.update_sender(&carol, update, 10).unwrap();
    assert_eq!(p.sender_snapshot(&carol).unwrap().effective_amt_per_block, Amount::ZERO);
    p.set_amount_per_block(&carol, amt(14), 10).unwrap();

    // alice: 10/block from 0, carol: 14/block from 10.
    assert_eq!(p.collect(&bob, 30).unwrap(), amt(300 + 280));
    assert_eq!(p.withdrawable(&carol, 30).unwrap(), amt(1_000 - 280));
}

#[test]
fn removed_receiver_keeps_what_it_earned() {
    let (alice, b, c, d) = (acct(1), acct(2), acct(3), acct(4));
    let mut p = streaming_pool(10, alice, 6_000, 60, &[(b, 1), (c, 2), (d, 3)], 0);

    p.set_receiver_weight(&alice, &c, 0, 5).unwrap();
    let snapshot = p.sender_snapshot(&alice).unwrap();
    assert_eq!(snapshot.weight_sum, 4);
    assert_eq!(snapshot.weight_count, 2);

    // Newest first; the removed node is unlinked while enumerating.
    assert_eq!(p.receivers(&alice), vec![(d, 3), (b, 1)]);
    assert_eq!(p.sender(&alice).unwrap().receivers().linked_len(), 2);

    // 5 blocks at 10 per weight, then 95 blocks at 15 per weight.
    assert_eq!(p.collectable(&b, 200).unwrap(), amt(50 + 1_425));
    assert_eq!(p.collectable(&c, 200).unwrap(), amt(100));
    assert_eq!(p.collectable(&d, 200).unwrap(), amt(150 + 4_275));
    assert_eq!(p.withdrawable(&alice, 200).unwrap(), Amount::ZERO);

    // Re-adding moves the receiver to the front.
    p.set_receiver_weight(&alice, &c, 1, 200).unwrap();
    assert_eq!(p.receivers(&alice), vec![(c, 1), (d, 3), (b, 1)]);
}

#[test]
fn withdraw_mid_stream_shortens_it() {
    let (alice, bob) = (acct(1), acct(2));
    let mut p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 0);

    assert_eq!(p.withdraw(&alice, amt(500), 20).unwrap(), amt(500));
    assert_eq!(p.sender_snapshot(&alice).unwrap().end_block, Some(50));
    assert_eq!(p.collectable(&bob, 100).unwrap(), amt(500));
    assert_eq!(
        p.withdraw(&alice, Amount::ONE, 100),
        Err(PoolError::InsufficientBalance { have: Amount::ZERO, need: Amount::ONE })
    );
}

#[test]
fn past_blocks_are_rejected() {
    let (alice, bob) = (acct(1), acct(2));
    let mut p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 50);

    let regression = PoolError::BlockRegression { got: 49, latest: 50 };
    assert_eq!(p.top_up(&alice, Amount::ONE, 49), Err(regression.clone()));
    assert_eq!(p.collect(&bob, 49), Err(regression.clone()));
    assert_eq!(p.withdrawable(&alice, 49), Err(regression.clone()));
    assert_eq!(p.collectable(&bob, 49), Err(regression));
    assert_eq!(p.top_up(&alice, Amount::ONE, 50), Ok(()));
}

#[test]
fn events_record_updates_and_collections() {
    let (alice, bob) = (acct(1), acct(2));
    let mut p = streaming_pool(10, alice, 1_000, 10, &[(bob, 1)], 0);
    p.collect(&bob, 20).unwrap();
    p.collect(&bob, 20).unwrap();

    let events = p.drain_events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        PoolEvent::SenderUpdated {
            sender: alice,
            block: 0,
            balance: amt(1_000),
            amt_per_block: amt(10),
        }
    );
    assert_eq!(
        events[1],
        PoolEvent::Collected {
            receiver: bob,
            block: 20,
            amount: amt(200),
        }
    );
    assert!(p.events().is_empty());
}

#[test]
fn scenario_file_runs_end_to_end() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{}", Scenario::example().to_json_pretty().unwrap()).unwrap();

    let json = std::fs::read_to_string(file.path()).unwrap();
    let scenario = Scenario::from_json(&json).unwrap();
    let mut sim = Simulator::new(&SimConfig::default(), &scenario).unwrap();
    let report = sim.run(&scenario).unwrap();

    assert!(report.passed(), "{report:#?}");
    assert_eq!(report.mismatches, 0);
    assert_eq!(report.conservation.topped_up, amt(1_000));
    assert_eq!(report.conservation.collected, amt(300));
}

#[test]
fn random_scenarios_conserve_funds_across_cycle_lengths() {
    use rand::{Rng, SeedableRng};

    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..25 {
        let seed = rng.r#gen::<u64>();
        let scenario = Scenario::random(seed, 4, 8, 300);
        let mut sim = Simulator::new(&SimConfig::default(), &scenario).unwrap();
        let report = sim.run(&scenario).unwrap();
        let c = &report.conservation;
        assert!(c.is_balanced(), "seed {seed}: {c:?}");
    }
}

#[test]
fn stream_running_into_the_block_horizon_is_conserved() {
    let mut sim = simulator(10);
    let steps = [
        Action::TopUp { sender: "alice".into(), amount: MAX_AMOUNT },
        Action::SetAmountPerBlock { sender: "alice".into(), amt_per_block: Amount::ONE },
        Action::SetReceiverWeight { sender: "alice".into(), receiver: "bob".into(), weight: 1 },
    ];
    for action in &steps {
        sim.apply(action, 0).unwrap();
    }
    sim.apply(&Action::Collect { receiver: "bob".into() }, 1_000).unwrap();

    let c = sim.conservation().unwrap();
    assert!(c.is_balanced(), "{c:?}");
    assert_eq!(c.collected, amt(1_000));
    assert_eq!(c.outstanding, Amount::from(MAX_BLOCK) - amt(1_000));
}
