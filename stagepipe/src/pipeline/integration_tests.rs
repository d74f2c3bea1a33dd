//! End-to-end compilation tests.

#[cfg(test)]
mod tests {
    use crate::core::ArtifactKind;
    use crate::errors::{DefinitionError, StagepipeError};
    use crate::pipeline::{
        compile, fraud_detection_pipeline, PipelineBuilder, FRAUD_DETECTION_PIPELINE,
    };
    use crate::stages::{EnvBinding, StageDescriptor};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    const IMAGE: &str = "python:3.11";

    fn linear_stages() -> Vec<StageDescriptor> {
        vec![
            StageDescriptor::new("extract", IMAGE).with_output("raw_csv", ArtifactKind::Dataset),
            StageDescriptor::new("train", IMAGE)
                .with_input("raw_csv", ArtifactKind::Dataset)
                .with_output("model_onnx", ArtifactKind::Model),
            StageDescriptor::new("upload", IMAGE).with_input("model_onnx", ArtifactKind::Model),
        ]
    }

    fn diamond_stages() -> Vec<StageDescriptor> {
        vec![
            StageDescriptor::new("extract", IMAGE).with_output("raw", ArtifactKind::Dataset),
            StageDescriptor::new("clean", IMAGE)
                .with_input("raw", ArtifactKind::Dataset)
                .with_output("clean", ArtifactKind::Dataset),
            StageDescriptor::new("profile", IMAGE)
                .with_input("raw", ArtifactKind::Dataset)
                .with_output("profile", ArtifactKind::Metrics),
            StageDescriptor::new("train", IMAGE)
                .with_input("clean", ArtifactKind::Dataset)
                .with_input("profile", ArtifactKind::Metrics)
                .with_output("model", ArtifactKind::Model),
        ]
    }

    #[test]
    fn test_linear_example_compiles_to_three_nodes_two_edges() {
        let graph = PipelineBuilder::new("linear")
            .stages(linear_stages())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.stage_count(), 3);
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.entry_points(), vec!["extract"]);

        let pairs: Vec<(&str, &str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str(), e.artifact.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("extract", "train", "raw_csv"),
                ("train", "upload", "model_onnx"),
            ]
        );
    }

    #[test]
    fn test_edges_equal_producer_consumer_pairs() {
        let stages = diamond_stages();
        let graph = PipelineBuilder::new("diamond")
            .stages(stages.clone())
            .unwrap()
            .build()
            .unwrap();

        let mut expected = HashSet::new();
        for consumer in &stages {
            for input in &consumer.inputs {
                let producer = stages
                    .iter()
                    .find(|s| s.outputs.iter().any(|o| o.artifact_name() == input.artifact_name()))
                    .unwrap();
                expected.insert((producer.name.clone(), consumer.name.clone()));
            }
        }
        let actual: HashSet<(String, String)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();

        assert_eq!(actual, expected);
        assert_eq!(graph.execution_order(), &["extract", "clean", "profile", "train"]);
        assert_eq!(graph.dependencies_of("train"), vec!["clean", "profile"]);
    }

    #[test]
    fn test_mutual_dependency_names_both_stages() {
        let stages = vec![
            StageDescriptor::new("seed", IMAGE),
            StageDescriptor::new("a", IMAGE)
                .with_input("from_b", ArtifactKind::Dataset)
                .with_output("from_a", ArtifactKind::Dataset),
            StageDescriptor::new("b", IMAGE)
                .with_input("from_a", ArtifactKind::Dataset)
                .with_output("from_b", ArtifactKind::Dataset),
        ];

        let err = compile("cyclic", stages).unwrap_err();
        match err {
            StagepipeError::Definition(DefinitionError::CyclicGraph(cycle)) => {
                let stages: HashSet<String> = cycle.stages().into_iter().collect();
                assert_eq!(stages, HashSet::from(["a".to_string(), "b".to_string()]));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_without_entry_point_is_still_reported_as_cycle() {
        let stages = vec![
            StageDescriptor::new("a", IMAGE)
                .with_input("from_b", ArtifactKind::Dataset)
                .with_output("from_a", ArtifactKind::Dataset),
            StageDescriptor::new("b", IMAGE)
                .with_input("from_a", ArtifactKind::Dataset)
                .with_output("from_b", ArtifactKind::Dataset),
        ];

        let err = PipelineBuilder::new("cyclic")
            .stages(stages)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::CyclicGraph(_)));
    }

    #[test]
    fn test_missing_artifact_names_stage_and_slot() {
        let stages = vec![
            StageDescriptor::new("extract", IMAGE).with_output("raw_csv", ArtifactKind::Dataset),
            StageDescriptor::new("train", IMAGE).with_input_from(
                "training_data",
                ArtifactKind::Dataset,
                "missing_artifact",
            ),
        ];

        let err = PipelineBuilder::new("broken")
            .stages(stages)
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            DefinitionError::UnresolvedDependency {
                stage: "train".to_string(),
                slot: "training_data".to_string(),
                artifact: "missing_artifact".to_string(),
            }
        );
    }

    #[test]
    fn test_kind_mismatch_across_stages() {
        let stages = vec![
            StageDescriptor::new("extract", IMAGE).with_output("raw_csv", ArtifactKind::Dataset),
            StageDescriptor::new("upload", IMAGE).with_input("raw_csv", ArtifactKind::Model),
        ];

        let err = compile("mismatch", stages).unwrap_err();
        assert!(matches!(
            err,
            StagepipeError::Definition(DefinitionError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_two_producers_of_one_artifact() {
        let stages = vec![
            StageDescriptor::new("a", IMAGE).with_output("raw", ArtifactKind::Dataset),
            StageDescriptor::new("b", IMAGE).with_output("raw", ArtifactKind::Dataset),
        ];

        let err = compile("dup", stages).unwrap_err();
        assert!(matches!(
            err,
            StagepipeError::Definition(DefinitionError::DuplicateArtifact { .. })
        ));
    }

    #[test]
    fn test_compilation_is_byte_identical() {
        let first = compile("diamond", diamond_stages()).unwrap();
        let second = compile("diamond", diamond_stages()).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_document_never_contains_secret_values() {
        let compiled = compile(FRAUD_DETECTION_PIPELINE, fraud_detection_pipeline()).unwrap();
        let upload = compiled
            .document()
            .stages
            .iter()
            .find(|s| s.name == "upload_model")
            .unwrap();

        for binding in &upload.env {
            if let EnvBinding::Secret { secret, .. } = binding {
                assert_eq!(secret.secret_name, "pipeline-one");
            }
        }
        let text = String::from_utf8(compiled.as_bytes().to_vec()).unwrap();
        assert!(text.contains("\"secret_name\": \"pipeline-one\""));
        assert!(!text.contains("\"value\": \"AKIA"));
    }

    #[test]
    fn test_document_paths_follow_artifacts() {
        let compiled = compile("linear", linear_stages()).unwrap();
        let document = compiled.document();

        let train = document.stages.iter().find(|s| s.name == "train").unwrap();
        assert_eq!(train.depends_on, vec!["extract"]);
        assert_eq!(train.inputs[0].path, "artifacts/extract/raw_csv");
        assert_eq!(train.outputs[0].path, "artifacts/train/model_onnx");

        let raw = document.artifacts.iter().find(|a| a.name == "raw_csv").unwrap();
        assert_eq!(raw.consumers, vec!["train"]);
    }

    #[test]
    fn test_renamed_output_wires_to_renamed_input() {
        let compiled = compile(
            "renamed",
            [
                StageDescriptor::new("fit", IMAGE)
                    .with_package("skl2onnx")
                    .with_output_as("model_path", ArtifactKind::Model, "fraud_model"),
                StageDescriptor::new("serve", IMAGE).with_input_from(
                    "model_input",
                    ArtifactKind::Model,
                    "fraud_model",
                ),
            ],
        )
        .unwrap();
        let document = compiled.document();

        assert_eq!(document.edges.len(), 1);
        assert_eq!(document.edges[0].artifact, "fraud_model");

        let fit = document.stages.iter().find(|s| s.name == "fit").unwrap();
        assert_eq!(fit.packages, vec!["skl2onnx"]);
        assert_eq!(fit.outputs[0].artifact, "fraud_model");
        assert_eq!(fit.outputs[0].path, "artifacts/fit/model_path");

        let serve = document.stages.iter().find(|s| s.name == "serve").unwrap();
        assert_eq!(serve.depends_on, vec!["fit"]);
        assert_eq!(serve.inputs[0].path, "artifacts/fit/model_path");
    }
}
