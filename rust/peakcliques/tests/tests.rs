use peakcliques::{
    CorrespondenceConfig,
    PeakCorrespondenceEngine,
    PeakKey,
    RetentionTimeDifference,
    RunPeaks,
    match_runs,
    select_reference,
};
use ridgepeaks::{
    Peak,
    PeakId,
    RunId,
};
use std::collections::HashSet;

fn run(run_id: RunId, rts: &[f64]) -> RunPeaks {
    RunPeaks::new(
        run_id,
        rts.iter()
            .enumerate()
            .map(|(i, &rt)| Peak::new(run_id, i as PeakId, (rt * 10.0) as usize, rt, 100.0))
            .collect(),
    )
}

/// Deterministic jittered retention times: a shared set of compounds plus
/// per-run noise and a few run specific extras.
fn jittered_runs(num_runs: u32) -> Vec<RunPeaks> {
    let mut state: u64 = 0x2545F4914F6CDD1D;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };
    (0..num_runs)
        .map(|r| {
            let mut rts: Vec<f64> = (0..30)
                .map(|c| c as f64 * 4.0 + (next() - 0.5) * 3.0)
                .collect();
            for _ in 0..5 {
                rts.push(next() * 120.0);
            }
            run(r, &rts)
        })
        .collect()
}

#[test]
fn test_recorded_similarities_are_symmetric() {
    let mut engine = PeakCorrespondenceEngine::new(jittered_runs(4), RetentionTimeDifference).unwrap();
    let scored = engine.compute_similarities(5.0).unwrap();
    assert!(scored > 0);

    for run in engine.runs() {
        for p in run.peaks.iter() {
            for (&other_run, peers) in p.similarity_to_other_runs.iter() {
                assert_ne!(other_run, p.run_id);
                for (&peer, &score) in peers.iter() {
                    let q = engine.peak(&PeakKey::new(other_run, peer)).unwrap();
                    let back = q
                        .scores_for_run(p.run_id)
                        .and_then(|s| s.get(&p.id))
                        .copied();
                    assert_eq!(back, Some(score), "Asymmetric score for {:?}/{:?}", p.id, q.id);
                    assert!(score < 5.0);
                }
            }
        }
    }
}

#[test]
fn test_bidirectional_best_hit_is_symmetric() {
    let mut engine = PeakCorrespondenceEngine::new(jittered_runs(3), RetentionTimeDifference).unwrap();
    engine.compute_similarities(5.0).unwrap();
    let peaks: Vec<&Peak> = engine.runs().iter().flat_map(|r| r.peaks.iter()).collect();
    let mut num_bbh = 0;
    for p in peaks.iter() {
        for q in peaks.iter() {
            let pq = engine.is_bidirectional_best_hit(p, q);
            assert_eq!(pq, engine.is_bidirectional_best_hit(q, p));
            if p.run_id == q.run_id {
                assert!(!pq);
            }
            if pq {
                num_bbh += 1;
            }
        }
    }
    assert!(num_bbh > 0);
}

#[test]
fn test_cliques_hold_one_peak_per_run() {
    let config = CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: 2,
    };
    let result = match_runs(jittered_runs(5), RetentionTimeDifference, &config).unwrap();
    assert!(!result.cliques.is_empty());

    let mut seen: HashSet<PeakKey> = HashSet::new();
    for clique in result.cliques.iter() {
        let runs: HashSet<RunId> = clique.run_ids().collect();
        assert_eq!(runs.len(), clique.len(), "Clique {} repeats a run", clique.id);
        assert!(clique.len() >= 2);
        for p in clique.members.iter() {
            assert!(seen.insert(PeakKey::of(p)), "Peak in two cliques");
        }
    }
    let ids: Vec<usize> = result.cliques.iter().map(|c| c.id).collect();
    assert_eq!(ids, (0..result.cliques.len()).collect::<Vec<_>>());
}

#[test]
fn test_every_member_has_a_bbh_edge_in_its_clique() {
    let runs = jittered_runs(4);
    let mut engine = PeakCorrespondenceEngine::new(runs, RetentionTimeDifference).unwrap();
    engine.compute_similarities(5.0).unwrap();
    engine.prune_unmatched();
    let (cliques, _) = engine.assign_cliques(2).unwrap();
    for clique in cliques.iter() {
        for p in clique.members.iter() {
            let p = engine.peak(&PeakKey::of(p)).unwrap();
            let connected = clique.members.iter().any(|q| {
                let q = engine.peak(&PeakKey::of(q)).unwrap();
                engine.is_bidirectional_best_hit(p, q)
            });
            assert!(connected, "Peak {:?} of run {} is unconnected", p.id, p.run_id);
        }
        // Every member touches at least one edge.
        assert!(clique.bbh_edges >= clique.len().div_ceil(2));
    }
}

#[test]
fn test_two_run_scenario() {
    let runs = vec![run(1, &[10.0, 50.0, 90.0]), run(2, &[12.0, 52.0, 130.0])];
    let config = CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: -1,
    };
    let result = match_runs(runs, RetentionTimeDifference, &config).unwrap();

    assert_eq!(result.cliques.len(), 2);
    let rts: Vec<Vec<f64>> = result
        .cliques
        .iter()
        .map(|c| c.members.iter().map(|p| p.apex_retention_time).collect())
        .collect();
    assert_eq!(rts, vec![vec![10.0, 12.0], vec![50.0, 52.0]]);

    let mut unmatched: Vec<f64> = result
        .unmatched
        .iter()
        .map(|p| p.apex_retention_time)
        .collect();
    unmatched.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(unmatched, vec![90.0, 130.0]);

    assert_eq!(result.anchors.len(), 4);
    assert_eq!(result.accounting[0].total, 3);
    assert_eq!(result.accounting[0].matched, 2);
    assert_eq!(result.accounting[1].unmatched, 1);
    // Both runs have the same aggregate, the lower id wins.
    assert_eq!(result.reference.reference_run, 1);
}

#[test]
fn test_transitive_clique() {
    // a-b and b-c are best hits, a and c are never scored against each other.
    let runs = vec![run(0, &[10.0]), run(1, &[14.0]), run(2, &[18.0])];
    let config = CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: 3,
    };
    let result = match_runs(runs, RetentionTimeDifference, &config).unwrap();
    assert_eq!(result.cliques.len(), 1);
    let clique = &result.cliques[0];
    assert_eq!(clique.run_ids().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(clique.bbh_edges, 2);
    assert!(result.unmatched.is_empty());
    assert_eq!(result.reference.reference_run, 1);
}

#[test]
fn test_empty_run_does_not_abort() {
    let runs = vec![run(0, &[10.0, 30.0]), run(1, &[]), run(2, &[11.0, 31.0])];
    let result = match_runs(runs, RetentionTimeDifference, &CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: -1,
    })
    .unwrap();
    // Two runs have peaks, so every clique needs two members.
    assert_eq!(result.cliques.len(), 2);
    assert_eq!(result.accounting[1].total, 0);
    assert_eq!(result.accounting[1].matched, 0);
}

#[test]
fn test_reference_is_permutation_invariant() {
    let config = CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: 2,
    };
    let result = match_runs(jittered_runs(4), RetentionTimeDifference, &config).unwrap();

    let forward = select_reference(&[0, 1, 2, 3], &result.cliques, &RetentionTimeDifference).unwrap();
    let mut shuffled_cliques = result.cliques.clone();
    shuffled_cliques.reverse();
    let backward =
        select_reference(&[3, 1, 0, 2], &shuffled_cliques, &RetentionTimeDifference).unwrap();
    assert_eq!(forward.reference_run, backward.reference_run);
    assert_eq!(forward.scores, backward.scores);
    assert_eq!(forward.aggregates, backward.aggregates);
}

#[test]
fn test_reference_tie_goes_to_lowest_run() {
    // All three peaks are mutual best hits and runs 5 and 8 tie.
    let runs = vec![run(8, &[10.0]), run(3, &[11.0]), run(5, &[10.0, 50.0])];
    let mut engine = PeakCorrespondenceEngine::new(runs, RetentionTimeDifference).unwrap();
    engine.compute_similarities(5.0).unwrap();
    let (cliques, _) = engine.assign_cliques(2).unwrap();
    let selection = select_reference(&engine.run_ids(), &cliques, &RetentionTimeDifference).unwrap();
    assert_eq!(selection.scores.run_ids(), &[3, 5, 8]);
    // 3-5: 1, 3-8: 1, 5-8: 0 -> aggregates 3: 2, 5: 1, 8: 1
    assert_eq!(selection.reference_run, 5);

    let a = vec![run(4, &[10.0]), run(2, &[11.0])];
    let result = match_runs(a, RetentionTimeDifference, &CorrespondenceConfig {
        max_rt_difference: 5.0,
        min_clique_size: 2,
    })
    .unwrap();
    assert_eq!(result.reference.reference_run, 2);
}
