// End-to-end tests for the single_gsea crate: bulk runs over gene set collections, from ranked
// list to adjusted p-values.

#[cfg(test)]
mod integration_tests {
    use single_gsea::enrichment::{
        bulk_gsea, BulkRunner, EnrichmentScorer, GeneSet, GeneSetCollection, GseaConfig,
        GseaError, PermutationEngine, RankedList, SizeBounds, StageState, TrialSchedule,
    };

    fn example_list() -> RankedList {
        RankedList::new(vec![
            ("A", 5.0),
            ("B", 4.0),
            ("C", 3.0),
            ("D", 2.0),
            ("E", 1.0),
            ("F", -1.0),
            ("G", -2.0),
            ("H", -3.0),
        ])
        .unwrap()
    }

    fn numbered_list(n: usize) -> RankedList {
        RankedList::new((0..n).map(|i| (format!("G{}", i), (n - i) as f64 / n as f64 - 0.5)))
            .unwrap()
    }

    fn genes(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("G{}", i)).collect()
    }

    #[test]
    fn test_top_ranked_set_is_enriched() {
        let ranked = example_list();
        let collection = GeneSetCollection::from_pairs(vec![
            ("top", vec!["A", "B", "C"]),
            ("random", vec!["D", "E", "F"]),
        ])
        .unwrap();

        let table = bulk_gsea(
            &ranked,
            &collection,
            SizeBounds::new(0, 10).unwrap(),
            &[1000, 10000],
            Some(1),
        )
        .unwrap();

        let top = table.get("top").unwrap();
        let random = table.get("random").unwrap();
        println!(
            "top: es={} edge={} p={} | random: es={} p={}",
            top.enrichment_score, top.edge, top.p_value, random.enrichment_score, random.p_value
        );

        assert!(top.enrichment_score > 0.0);
        assert!(top.edge > 0.0);
        assert_eq!(top.leading_edge, vec!["A", "B", "C"]);
        assert!(top.p_value < 0.05);
        assert!(top.p_value < random.p_value);
    }

    #[test]
    fn test_bottom_ranked_set_is_depleted() {
        let ranked = example_list();
        let collection =
            GeneSetCollection::from_pairs(vec![("bottom", vec!["F", "G", "H"])]).unwrap();

        let table = bulk_gsea(
            &ranked,
            &collection,
            SizeBounds::new(0, 10).unwrap(),
            &[1000],
            Some(2),
        )
        .unwrap();

        let bottom = table.get("bottom").unwrap();
        assert!(bottom.enrichment_score < 0.0);
        assert!(bottom.edge < 0.0);
        assert!(bottom.p_value < 0.05);
    }

    #[test]
    fn test_size_filter_keeps_only_sets_within_bounds() {
        let ranked = numbered_list(1000);
        let collection = GeneSetCollection::from_pairs(vec![
            ("size_5", genes(0..5)),
            ("size_20", genes(100..120)),
            ("size_600", genes(200..800)),
        ])
        .unwrap();

        let table = bulk_gsea(
            &ranked,
            &collection,
            SizeBounds::new(15, 500).unwrap(),
            &[100],
            Some(3),
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.get("size_20").is_some());
        assert!(table.skipped().is_empty());
    }

    #[test]
    fn test_ten_trial_schedule_respects_floor() {
        let ranked = numbered_list(100);
        let collection =
            GeneSetCollection::from_pairs(vec![("weak", vec!["G10", "G35", "G60", "G85"])])
                .unwrap();

        let table = bulk_gsea(
            &ranked,
            &collection,
            SizeBounds::new(0, 10).unwrap(),
            &[10],
            Some(4),
        )
        .unwrap();

        let weak = table.get("weak").unwrap();
        assert_eq!(weak.trials, 10);
        assert!(weak.p_value >= 0.1);
        assert!(weak.p_value > 0.0);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let ranked = numbered_list(300);
        let collection = GeneSetCollection::from_pairs(vec![
            ("a", genes(0..20)),
            ("b", genes(140..160)),
            ("c", genes(5..300).into_iter().step_by(15).collect()),
        ])
        .unwrap();
        let config = GseaConfig::default()
            .with_size_bounds(SizeBounds::new(5, 100).unwrap())
            .with_seed(42);

        let first = BulkRunner::new(config.clone()).run(&ranked, &collection).unwrap();
        let second = BulkRunner::new(config).run(&ranked, &collection).unwrap();
        assert_eq!(first.rows(), second.rows());

        let reordered = GeneSetCollection::from_pairs(vec![
            ("c", genes(5..300).into_iter().step_by(15).collect::<Vec<_>>()),
            ("a", genes(0..20)),
            ("b", genes(140..160)),
        ])
        .unwrap();
        let third = BulkRunner::new(
            GseaConfig::default()
                .with_size_bounds(SizeBounds::new(5, 100).unwrap())
                .with_seed(42),
        )
        .run(&ranked, &reordered)
        .unwrap();
        for name in ["a", "b", "c"] {
            assert_eq!(first.get(name).unwrap().p_value, third.get(name).unwrap().p_value);
        }
    }

    #[test]
    fn test_escalation_refines_significant_estimate() {
        let ranked = numbered_list(200);
        let set = GeneSet::new("top10", genes(0..10));
        let scorer = EnrichmentScorer::default();
        let observed = scorer.score(&ranked, &set).unwrap().score;

        let short = PermutationEngine::new(scorer, TrialSchedule::new(&[1000]).unwrap())
            .estimate_significance(&ranked, &set, observed, Some(5))
            .unwrap();
        let long = PermutationEngine::new(scorer, TrialSchedule::new(&[1000, 20000]).unwrap())
            .estimate_significance(&ranked, &set, observed, Some(5))
            .unwrap();

        println!("short p={} long p={}", short.p_value, long.p_value);
        assert_eq!(short.summary.trials, 1000);
        assert_eq!(long.summary.trials, 20000);
        assert!(long.p_value <= short.p_value);
        assert!(short.p_value - long.p_value <= 1.0 / 1000.0);
        assert!(short.p_value <= 1.0 / 1000.0);
        assert_eq!(long.state, StageState::Exhausted);
    }

    #[test]
    fn test_adjusted_p_values_dominate_and_keep_order() {
        let ranked = numbered_list(400);
        let mut collection = GeneSetCollection::new();
        for (i, start) in (0..380).step_by(20).enumerate() {
            collection
                .insert(format!("window_{}", i), genes(start..start + 20))
                .unwrap();
        }
        let table = BulkRunner::new(
            GseaConfig::default()
                .with_size_bounds(SizeBounds::new(10, 50).unwrap())
                .with_trial_schedule(&[100, 1000])
                .with_seed(6),
        )
        .run(&ranked, &collection)
        .unwrap();

        assert_eq!(table.len(), 19);
        for a in table.iter() {
            assert!(a.adjusted_p_value >= a.p_value);
            assert!(a.adjusted_p_value <= 1.0);
            for b in table.iter() {
                if a.p_value < b.p_value {
                    assert!(a.adjusted_p_value <= b.adjusted_p_value);
                }
            }
        }

        let sorted = table.sorted_by_p_value();
        assert!(sorted.windows(2).all(|w| w[0].p_value <= w[1].p_value));
    }

    #[test]
    fn test_invalid_schedule_fails_before_work() {
        let ranked = example_list();
        let collection = GeneSetCollection::from_pairs(vec![("top", vec!["A", "B"])]).unwrap();

        for schedule in [vec![], vec![100, 0], vec![1000, 100]] {
            let config = GseaConfig::default()
                .with_size_bounds(SizeBounds::new(0, 10).unwrap())
                .with_trial_schedule(&schedule);
            let err = BulkRunner::new(config).run(&ranked, &collection).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<GseaError>(),
                Some(GseaError::InvalidSchedule(_))
            ));
        }
    }
}
