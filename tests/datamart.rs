mod common;

use adm_datamart::data::Value;
use adm_datamart::datamart::{Datamart, DatamartOptions, apply_predictor_categorization};
use adm_datamart::error::DatamartError;
use adm_datamart::frame::DataFrame;
use adm_datamart::query::QueryExpr;
use adm_datamart::schema::ColumnType;

use chrono::NaiveDate;
use common::{TestWorkspace, frame_from_csv, model_csv, predictor_csv};

fn model_frame(workspace: &TestWorkspace) -> DataFrame {
    frame_from_csv(workspace, "model_data.csv", model_csv())
}

fn predictor_frame(workspace: &TestWorkspace) -> DataFrame {
    frame_from_csv(workspace, "predictor_data.csv", predictor_csv())
}

fn column_values(frame: &DataFrame, name: &str) -> Vec<Option<Value>> {
    let idx = frame.column_index(name).expect("column present");
    frame.rows.iter().map(|row| row[idx].clone()).collect()
}

#[test]
fn success_rate_is_positives_over_responses_with_nan_as_zero() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        None,
        DatamartOptions::default(),
    )
    .expect("construct datamart");

    let frame = datamart.model_data().expect("model data").collect().unwrap();
    let rates = column_values(&frame, "SuccessRate");
    assert_eq!(
        rates,
        vec![
            Some(Value::Float(0.25)),
            Some(Value::Float(0.25)),
            // 0/0 is normalized to 0, not NaN.
            Some(Value::Float(0.0)),
        ]
    );
}

#[test]
fn snapshot_time_is_parsed_into_a_timestamp() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        None,
        DatamartOptions::default(),
    )
    .unwrap();

    let frame = datamart.model_data().unwrap().collect().unwrap();
    assert_eq!(
        frame.column_type("SnapshotTime"),
        Some(&ColumnType::DateTime)
    );
    let expected = NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    assert_eq!(frame.cell(0, frame.column_index("SnapshotTime").unwrap()),
        Some(&Value::DateTime(expected)));
}

#[test]
fn context_keys_follow_candidate_order_and_presence() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        None,
        DatamartOptions::default(),
    )
    .unwrap();

    assert_eq!(datamart.context_keys(), ["Channel", "Name"]);
}

#[test]
fn treatment_joins_context_keys_only_when_present_in_schema() {
    let workspace = TestWorkspace::new();
    let csv = "pyModelID,pyPositives,pyResponseCount,pySnapshotTime,pyName,pyChannel,pyTreatment\n\
               m1,5,20,2024-05-06 14:30:00,OfferA,Web,Bundle\n";
    let frame = frame_from_csv(&workspace, "with_treatment.csv", csv);
    let datamart = Datamart::new(Some(frame), None, DatamartOptions::default()).unwrap();

    assert_eq!(datamart.context_keys(), ["Channel", "Name", "Treatment"]);
}

#[test]
fn context_keys_default_to_candidates_when_model_is_absent() {
    let datamart = Datamart::new(None, None, DatamartOptions::default()).unwrap();
    assert_eq!(
        datamart.context_keys(),
        ["Channel", "Direction", "Issue", "Group", "Name"]
    );
    assert!(datamart.model_data().is_none());
    assert!(datamart.predictor_data().is_none());
    assert!(datamart.combined_data().is_none());
}

#[test]
fn missing_snapshot_time_fails_at_construction() {
    let workspace = TestWorkspace::new();
    let csv = "pyModelID,pyPositives,pyResponseCount,pyName\nm1,5,20,OfferA\n";
    let frame = frame_from_csv(&workspace, "no_snapshot.csv", csv);
    let err = Datamart::new(Some(frame), None, DatamartOptions::default()).unwrap_err();
    match err {
        DatamartError::Schema { column, .. } => assert_eq!(column, "SnapshotTime"),
        other => panic!("Expected schema error, got {other:?}"),
    }
}

#[test]
fn missing_positives_only_fails_at_materialization() {
    let workspace = TestWorkspace::new();
    let csv = "pyModelID,pyResponseCount,pySnapshotTime,pyName\n\
               m1,20,2024-05-06 14:30:00,OfferA\n";
    let frame = frame_from_csv(&workspace, "no_positives.csv", csv);

    // Construction builds the pipeline without touching rows.
    let datamart = Datamart::new(Some(frame), None, DatamartOptions::default()).unwrap();
    let err = datamart.model_data().unwrap().collect().unwrap_err();
    match err {
        DatamartError::Schema { column, .. } => assert_eq!(column, "Positives"),
        other => panic!("Expected schema error, got {other:?}"),
    }
}

#[test]
fn predictor_pipeline_derives_bins_and_categories() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        None,
        Some(predictor_frame(&workspace)),
        DatamartOptions::default(),
    )
    .unwrap();

    let frame = datamart
        .predictor_data()
        .expect("predictor data")
        .collect()
        .unwrap();

    assert_eq!(
        column_values(&frame, "BinResponseCount")[0],
        Some(Value::Float(10.0))
    );
    assert_eq!(
        column_values(&frame, "BinPropensity")[0],
        Some(Value::Float(0.3))
    );
    assert_eq!(
        column_values(&frame, "BinAdjustedPropensity")[0],
        Some(Value::Float(3.5 / 11.0))
    );
    assert_eq!(
        column_values(&frame, "PredictorCategory"),
        vec![
            Some(Value::String("Customer".into())),
            Some(Value::String("Customer".into())),
            Some(Value::String("Primary".into())),
            Some(Value::String("Customer".into())),
        ]
    );
}

#[test]
fn existing_predictor_category_is_left_alone() {
    let workspace = TestWorkspace::new();
    let csv = "pyModelID,pyPredictorName,pyBinPositives,pyBinNegatives,pyPredictorCategory\n\
               m1,Customer.Age,3,7,HandLabelled\n";
    let frame = frame_from_csv(&workspace, "categorized.csv", csv);
    let datamart = Datamart::new(None, Some(frame), DatamartOptions::default()).unwrap();

    let collected = datamart.predictor_data().unwrap().collect().unwrap();
    assert_eq!(
        column_values(&collected, "PredictorCategory"),
        vec![Some(Value::String("HandLabelled".into()))]
    );
}

#[test]
fn direct_categorization_replaces_existing_labels() {
    let workspace = TestWorkspace::new();
    let csv = "pyModelID,pyPredictorName,pyBinPositives,pyBinNegatives,pyPredictorCategory\n\
               m1,Customer.Age,3,7,HandLabelled\n";
    let frame = frame_from_csv(&workspace, "categorized.csv", csv);
    let datamart = Datamart::new(None, Some(frame), DatamartOptions::default()).unwrap();

    use adm_datamart::categorize::{Categorization, default_name_prefix};
    let recategorized = apply_predictor_categorization(
        datamart.predictor_data().unwrap().clone(),
        Categorization::Rule(default_name_prefix()),
    );
    let collected = recategorized.collect().unwrap();
    assert_eq!(
        column_values(&collected, "PredictorCategory"),
        vec![Some(Value::String("Customer".into()))]
    );
}

#[test]
fn query_filters_restrict_the_model_dataset_only() {
    let workspace = TestWorkspace::new();
    let options = DatamartOptions {
        query: vec![QueryExpr::new("ResponseCount > 20")],
        ..DatamartOptions::default()
    };
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        Some(predictor_frame(&workspace)),
        options,
    )
    .unwrap();

    let model = datamart.model_data().unwrap().collect().unwrap();
    assert_eq!(model.row_count(), 1);
    assert_eq!(
        column_values(&model, "ResponseCount"),
        vec![Some(Value::Integer(40))]
    );

    // Predictor data is untouched by model-side filters.
    let predictor = datamart.predictor_data().unwrap().collect().unwrap();
    assert_eq!(predictor.row_count(), 4);
}

#[test]
fn filters_referencing_unknown_columns_fail_lazily() {
    let workspace = TestWorkspace::new();
    let options = DatamartOptions {
        query: vec![QueryExpr::new("Nonexistent > 1")],
        ..DatamartOptions::default()
    };
    let datamart = Datamart::new(Some(model_frame(&workspace)), None, options)
        .expect("construction does not evaluate filters");

    let err = datamart.model_data().unwrap().collect().unwrap_err();
    match err {
        DatamartError::Schema { column, .. } => assert_eq!(column, "Nonexistent"),
        other => panic!("Expected schema error, got {other:?}"),
    }
}

#[test]
fn combined_view_is_absent_when_either_source_is_absent() {
    let workspace = TestWorkspace::new();
    let model_only = Datamart::new(
        Some(model_frame(&workspace)),
        None,
        DatamartOptions::default(),
    )
    .unwrap();
    assert!(model_only.combined_data().is_none());
    assert!(model_only.model_data().is_some());

    let predictor_only = Datamart::new(
        None,
        Some(predictor_frame(&workspace)),
        DatamartOptions::default(),
    )
    .unwrap();
    assert!(predictor_only.combined_data().is_none());
    assert!(predictor_only.predictor_data().is_some());
}

#[test]
fn combined_view_inner_joins_on_model_id_and_snapshot_time() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        Some(predictor_frame(&workspace)),
        DatamartOptions::default(),
    )
    .unwrap();

    let combined = datamart.combined_data().expect("combined view");
    let frame = combined.collect().unwrap();

    // m1's first snapshot matches three predictor bins; the second m1
    // snapshot has no predictor rows at its timestamp, m2 has no
    // predictor rows at all, and predictor rows for m3 have no model.
    assert_eq!(frame.row_count(), 3);
    let model_ids = column_values(&frame, "ModelID");
    assert!(model_ids
        .iter()
        .all(|id| *id == Some(Value::String("m1".into()))));

    // Model-side metrics sit next to predictor-side bin columns.
    assert!(frame.has_column("SuccessRate"));
    assert!(frame.has_column("BinPropensity"));
    assert!(frame.has_column("PredictorName"));
}

#[test]
fn combined_view_is_rebuilt_per_request() {
    let workspace = TestWorkspace::new();
    let datamart = Datamart::new(
        Some(model_frame(&workspace)),
        Some(predictor_frame(&workspace)),
        DatamartOptions::default(),
    )
    .unwrap();

    let first = datamart.combined_data().unwrap().collect().unwrap();
    let second = datamart.combined_data().unwrap().collect().unwrap();
    assert_eq!(first.row_count(), second.row_count());
    assert_eq!(
        first.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
        second.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>()
    );
}
