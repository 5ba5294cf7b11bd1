use csdl_link::config::LinkerConfig;
use csdl_link::errors::LinkerError;
use csdl_link::graph::Value;
use csdl_link::types::*;
use csdl_link::{convert_types, AnnotationLinker, ConvertedModel};
use serde_json::json;

const UI: &str = "com.sap.vocabularies.UI.v1";

fn fixture() -> ParserOutput {
    serde_json::from_str(include_str!("fixtures/sales_order.json")).expect("fixture parses")
}

fn linked() -> ConvertedModel {
    convert_types(fixture()).expect("fixture links")
}

fn list(value: serde_json::Value) -> AnnotationList {
    serde_json::from_value(value).expect("valid annotation list")
}

/// First item of the `UI.LineItem` collection on `NS.Order`.
fn first_line_item(model: &ConvertedModel) -> RecordId {
    let line_item = model
        .annotation_for(Target::EntityType(0), "UI", "LineItem")
        .expect("line item attached");
    line_item.value.as_collection().unwrap()[0].as_record().unwrap()
}

#[test]
fn test_iso_currency_resolves_to_sibling_property() {
    let model = linked();

    let key = "NS.Order/Amount@Org.OData.Measures.V1.ISOCurrency";
    let id = match model.get(key) {
        Some(Target::Annotation(id)) => id,
        other => panic!("expected an annotation, got {:?}", other),
    };
    let currency = model.get("NS.Order/Currency");
    assert!(currency.is_some());
    assert_eq!(model.reference_target(&model.annotation(id).unwrap().value), currency);

    // Same annotation through the owning property's namespace.
    let amount = model.entity_type("NS.Order").unwrap().property("Amount").unwrap();
    assert_eq!(amount.annotations.get("Org.OData.Measures.V1", "ISOCurrency"), Some(id));
}

#[test]
fn test_qualified_annotation_keeps_qualifier() {
    let model = linked();
    let order = model.entity_type("NS.Order").unwrap();

    let id = order.annotations.get("UI", "FieldGroup#Details").expect("qualified key");
    assert_eq!(order.annotations.get_flat("UI.FieldGroup#Details"), Some(id));
    assert_eq!(order.annotations.get("UI", "FieldGroup"), None);

    let annotation = model.annotation(id).unwrap();
    assert_eq!(annotation.term, format!("{UI}.FieldGroup"));
    assert_eq!(annotation.qualifier.as_deref(), Some("Details"));
    assert_eq!(
        annotation.fully_qualified_name.as_deref(),
        Some("NS.Order@com.sap.vocabularies.UI.v1.FieldGroup#Details")
    );
}

#[test]
fn test_annotation_on_record_declared_before_its_target() {
    let model = linked();
    let record_id = first_line_item(&model);
    let record = model.record(record_id).unwrap();

    assert_eq!(
        record.fully_qualified_name.as_deref(),
        Some("NS.Order@com.sap.vocabularies.UI.v1.LineItem/0")
    );
    let importance = model
        .annotation_for(Target::Record(record_id), "UI", "Importance")
        .expect("importance attached to the record");
    assert_eq!(importance.value.as_str(), Some("UI.ImportanceType/High"));
}

#[test]
fn test_forward_reference_is_order_independent() {
    let mut output = fixture();
    let backend = output.schema.annotations.get_mut("backend").unwrap();
    let forward = backend.remove(0);
    backend.push(forward);

    let model = convert_types(output).unwrap();
    let record_id = first_line_item(&model);
    assert!(model
        .annotation_for(Target::Record(record_id), "UI", "Importance")
        .is_some());
    assert_eq!(model.unresolved_targets, vec!["NS.Missing".to_string()]);
}

#[test]
fn test_annotation_chains_need_enough_passes() {
    let chain = || {
        let mut output = fixture();
        output.schema.annotations.insert(
            "chain".to_string(),
            vec![
                list(json!({
                    "target": "NS.Customer@Test.Outer@Test.Inner",
                    "annotations": [{
                        "term": "Test.Note",
                        "value": { "type": "String", "String": "innermost" }
                    }]
                })),
                list(json!({
                    "target": "NS.Customer@Test.Outer",
                    "annotations": [
                        { "term": "Test.Inner", "value": { "type": "Bool", "Bool": true } }
                    ]
                })),
                list(json!({
                    "target": "NS.Customer",
                    "annotations": [{ "term": "Test.Outer", "value": { "type": "Int", "Int": 1 } }]
                })),
            ],
        );
        output
    };

    let model = convert_types(chain()).unwrap();
    let inner = model.get("NS.Customer@Test.Outer@Test.Inner").expect("inner annotation");
    let note = model.annotation_for(inner, "Test", "Note").expect("chain fully attached");
    assert_eq!(note.value, Value::String("innermost".to_string()));

    let single_retry = AnnotationLinker::new(LinkerConfig {
        forward_reference_passes: 1,
        ..LinkerConfig::default()
    });
    let model = single_retry.convert_types(chain()).unwrap();
    assert!(model.get("NS.Customer@Test.Outer@Test.Inner").is_some());
    assert!(model.get("NS.Customer@Test.Outer@Test.Inner@Test.Note").is_none());
    assert!(model
        .unresolved_targets
        .contains(&"NS.Customer@Test.Outer@Test.Inner".to_string()));
}

#[test]
fn test_forward_target_through_record_field() {
    // Declared deepest first: each list targets an annotation that only
    // exists once the list after it is attached.
    let mut output = fixture();
    output.schema.annotations.insert(
        "deep".to_string(),
        vec![
            list(json!({
                "target": "NS.Order/Amount@Test.Term1/Detail@Test.Term2",
                "annotations": [{ "term": "Test.Term3", "value": { "type": "Int", "Int": 3 } }]
            })),
            list(json!({
                "target": "NS.Order/Amount@Test.Term1/Detail",
                "annotations": [
                    { "term": "Test.Term2", "value": { "type": "String", "String": "second" } }
                ]
            })),
            list(json!({
                "target": "NS.Order/Amount",
                "annotations": [{
                    "term": "Test.Term1",
                    "record": {
                        "propertyValues": [{
                            "name": "Detail",
                            "value": {
                                "type": "Record",
                                "Record": {
                                    "propertyValues": [{
                                        "name": "Code",
                                        "value": { "type": "String", "String": "D" }
                                    }]
                                }
                            }
                        }]
                    }
                }]
            })),
        ],
    );

    let model = convert_types(output).unwrap();
    assert_eq!(model.unresolved_targets, vec!["NS.Missing".to_string()]);

    let detail = match model.resolve_from("NS.Order", "Amount/@Test.Term1/Detail") {
        Some(Target::Record(id)) => id,
        other => panic!("expected the Detail record, got {:?}", other),
    };
    let record = model.record(detail).unwrap();
    assert_eq!(
        record.fully_qualified_name.as_deref(),
        Some("NS.Order/Amount@Test.Term1/Detail")
    );

    let term2 = model
        .annotation_for(Target::Record(detail), "Test", "Term2")
        .expect("annotation on the record field");
    assert_eq!(term2.value.as_str(), Some("second"));

    let term2_target = model.get("NS.Order/Amount@Test.Term1/Detail@Test.Term2").unwrap();
    let term3 = model.annotation_for(term2_target, "Test", "Term3").expect("third level");
    assert_eq!(term3.value, Value::Int(3));
}

#[test]
fn test_navigation_dialects_reach_the_same_entity_type() {
    let mut output = fixture();
    let buyer: NavigationProperty = serde_json::from_value(json!({
        "name": "_Buyer",
        "fullyQualifiedName": "NS.Order/_Buyer",
        "relationship": "NS.Order_Buyer",
        "fromRole": "FromOrder",
        "toRole": "ToBuyer"
    }))
    .unwrap();
    output.schema.entity_types[0].navigation_properties.push(buyer);
    output.schema.associations.push(
        serde_json::from_value(json!({
            "name": "Order_Buyer",
            "fullyQualifiedName": "NS.Order_Buyer",
            "associationEnd": [
                { "role": "FromOrder", "type": "NS.Order", "multiplicity": "*" },
                { "role": "ToBuyer", "type": "NS.Customer", "multiplicity": "1" }
            ]
        }))
        .unwrap(),
    );

    let model = convert_types(output).unwrap();
    let order = model.entity_type("NS.Order").unwrap();
    let v4 = order.navigation_property("_Customer").unwrap().target_type;
    let v2 = order.navigation_property("_Buyer").unwrap().target_type;
    assert!(v4.is_some());
    assert_eq!(v4, v2);
    assert_eq!(
        model.schema.entity_types[v2.unwrap()].fully_qualified_name,
        "NS.Customer"
    );

    let name = model.get("NS.Customer/Name");
    assert_eq!(model.resolve_path(0, "_Customer/Name"), name);
    assert_eq!(model.resolve_path(0, "_Buyer/Name"), name);
}

#[test]
fn test_deferred_path_steps_into_annotation_record() {
    // Declared in a document that sorts before the one holding HeaderInfo.
    let mut output = fixture();
    output.schema.annotations.insert(
        "aaa".to_string(),
        vec![list(json!({
            "target": "NS.Order",
            "annotations": [{
                "term": "Test.TitleRef",
                "value": { "type": "AnnotationPath", "AnnotationPath": "@UI.HeaderInfo/Title" }
            }]
        }))],
    );

    let model = convert_types(output).unwrap();
    let title = model.resolve_from("NS.Order", "@UI.HeaderInfo/Title");
    assert!(matches!(title, Some(Target::Record(_))));

    let title_ref = model
        .annotation_for(Target::EntityType(0), "Test", "TitleRef")
        .unwrap();
    assert_eq!(model.reference_target(&title_ref.value), title);
    assert!(model.report().unresolved_references.is_empty());
}

#[test]
fn test_v2_and_v4_navigation_link_to_entity_types() {
    let model = linked();
    let order = model.entity_type("NS.Order").unwrap();

    assert_eq!(order.navigation_property("_Customer").unwrap().target_type, Some(1));
    assert_eq!(order.navigation_property("_Items").unwrap().target_type, Some(2));

    // Paths through either dialect land on the target type's properties.
    assert_eq!(model.resolve_path(0, "_Customer/Name"), model.get("NS.Customer/Name"));
    assert_eq!(model.resolve_path(0, "_Items/Product"), model.get("NS.OrderItem/Product"));
}

#[test]
fn test_bound_action_registered_under_both_names() {
    let model = linked();
    let order = model.entity_type("NS.Order").unwrap();

    assert_eq!(order.actions.get("Approve"), Some(&0));
    assert_eq!(order.actions.get("NS.Approve"), Some(&0));

    let action = model.action(0).unwrap();
    assert_eq!(action.source_entity_type, Some(0));
    assert_eq!(action.return_entity_type, Some(0));
}

#[test]
fn test_entity_set_links_entity_type_and_annotations() {
    let model = linked();
    let set = model.entity_set("NS.Container/Orders").unwrap();
    assert_eq!(set.entity_type_instance, Some(0));

    let label = model
        .annotation_for(Target::EntitySet(0), "Common", "Label")
        .expect("label on entity set");
    assert_eq!(label.value.as_str(), Some("Orders"));
}

#[test]
fn test_action_parameter_annotation() {
    let model = linked();
    let param = model.get("NS.Approve(NS.Order)/Comment").unwrap();
    let label = model.annotation_for(param, "Common", "Label").unwrap();
    assert_eq!(label.value.as_str(), Some("Reason"));
}

#[test]
fn test_annotation_path_resolves_after_final_sweep() {
    let model = linked();
    let facets = model.annotation_for(Target::EntityType(0), "UI", "Facets").unwrap();
    let facet = model
        .record(facets.value.as_collection().unwrap()[0].as_record().unwrap())
        .unwrap();
    assert_eq!(facet.record_type.as_deref(), Some("com.sap.vocabularies.UI.v1.ReferenceFacet"));

    let field_group = model.get("NS.Order@com.sap.vocabularies.UI.v1.FieldGroup#Details");
    assert!(field_group.is_some());
    assert_eq!(model.reference_target(facet.field("Target").unwrap()), field_group);
    assert!(model.store.to_resolve.is_empty());
}

#[test]
fn test_slash_at_target_annotates_the_annotation() {
    let model = linked();
    let field_group = model
        .get("NS.Order@com.sap.vocabularies.UI.v1.FieldGroup#Details")
        .unwrap();
    let label = model.annotation_for(field_group, "Common", "Label").unwrap();
    assert_eq!(label.value.as_str(), Some("Details"));
}

#[test]
fn test_property_paths_resolve_immediately() {
    let model = linked();
    let fields = model
        .annotation_for(Target::EntityType(0), "UI", "SelectionFields")
        .unwrap();
    let targets: Vec<Option<Target>> = fields
        .value
        .as_collection()
        .unwrap()
        .iter()
        .map(|v| model.reference_target(v))
        .collect();
    assert_eq!(
        targets,
        vec![model.get("NS.Order/CustomerID"), model.get("NS.Order/Currency")]
    );
}

#[test]
fn test_unknown_target_is_reported_not_fatal() {
    let model = linked();
    assert_eq!(model.unresolved_targets, vec!["NS.Missing".to_string()]);
    assert!(model.get("NS.Missing@com.sap.vocabularies.Common.v1.Label").is_none());
    assert!(model
        .object_map
        .contains("NS.Missing@com.sap.vocabularies.Common.v1.Label"));
}

#[test]
fn test_unresolved_path_stays_in_model() {
    let mut output = fixture();
    output.schema.annotations.insert(
        "extra".to_string(),
        vec![list(json!({
            "target": "NS.Customer/Name",
            "annotations": [
                { "term": "Common.Text", "value": { "type": "Path", "Path": "Nickname" } }
            ]
        }))],
    );

    let model = convert_types(output).unwrap();
    let text = model
        .annotation_for(model.get("NS.Customer/Name").unwrap(), "Common", "Text")
        .unwrap();
    assert_eq!(model.reference_target(&text.value), None);
    assert_eq!(model.report().unresolved_references, vec!["NS.Customer/Nickname".to_string()]);
}

#[test]
fn test_structural_error_aborts_conversion() {
    let mut output = fixture();
    output.schema.annotations.insert(
        "broken".to_string(),
        vec![list(json!({
            "target": "NS.Customer",
            "annotations": [{
                "term": "UI.Identification",
                "collection": { "type": "Int", "items": [{ "type": "Int", "Int": 1 }] }
            }]
        }))],
    );

    match convert_types(output) {
        Err(LinkerError::UnsupportedCollection { kind, target }) => {
            assert_eq!(kind, "Int");
            assert_eq!(target, "NS.Customer");
        }
        other => panic!(
            "expected an unsupported collection error, got {:?}",
            other.map(|m| m.report())
        ),
    }
}

#[test]
fn test_configured_aliases_stand_in_for_references() {
    let mut output = fixture();
    let references = std::mem::take(&mut output.references);

    let linker = AnnotationLinker::new(LinkerConfig {
        vocabulary_aliases: references,
        ..LinkerConfig::default()
    });
    let model = linker.convert_types(output).unwrap();
    assert!(model
        .get("NS.Order@com.sap.vocabularies.UI.v1.HeaderInfo")
        .is_some());
    assert!(model.references.is_empty());
}

#[test]
fn test_resolve_from_expands_aliases() {
    let model = linked();
    let header = model.resolve_from("NS.Order", "@UI.HeaderInfo");
    assert!(header.is_some());
    assert_eq!(header, model.get("NS.Order@com.sap.vocabularies.UI.v1.HeaderInfo"));
    assert_eq!(model.resolve_from("NS.Order", "@UI.Chart"), None);
}

#[test]
fn test_report_counts() {
    let model = linked();
    let report = model.report();

    assert_eq!(report.object_count, 31);
    assert_eq!(report.objects_by_kind.get("annotation"), Some(&11));
    assert_eq!(report.objects_by_kind.get("raw_annotation"), Some(&1));
    assert_eq!(report.objects_by_kind.get("property"), Some(&8));
    assert_eq!(report.annotation_count, 11);
    assert_eq!(report.record_count, 7);
    assert_eq!(report.reference_count, 8);
    assert_eq!(report.resolved_reference_count, 8);
    assert!(report.unresolved_references.is_empty());
    assert_eq!(report.unresolved_targets, vec!["NS.Missing".to_string()]);
}
