use super::SchemaChange;
use crate::model::Schema;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Orders changes for safe execution.
///
/// Table creates come first, topologically sorted so referenced tables
/// precede referencing ones. Constraint and column changes follow in the
/// order drop-FK, drop-column, add-column, alter-column, add-FK. Table drops
/// come last, referencing tables before the tables they reference.
pub fn plan_changes(changes: Vec<SchemaChange>, live: &Schema) -> Vec<SchemaChange> {
    let mut create_tables = Vec::new();
    let mut drop_foreign_keys = Vec::new();
    let mut drop_columns = Vec::new();
    let mut add_columns = Vec::new();
    let mut alter_columns = Vec::new();
    let mut add_foreign_keys = Vec::new();
    let mut drop_tables = Vec::new();

    for change in changes {
        match change {
            SchemaChange::CreateTable(_) => create_tables.push(change),
            SchemaChange::DropForeignKey { .. } => drop_foreign_keys.push(change),
            SchemaChange::DropColumn { .. } => drop_columns.push(change),
            SchemaChange::AddColumn { .. } => add_columns.push(change),
            SchemaChange::AlterColumn { .. } => alter_columns.push(change),
            SchemaChange::AddForeignKey { .. } => add_foreign_keys.push(change),
            SchemaChange::DropTable(_) => drop_tables.push(change),
        }
    }

    let mut planned = Vec::new();
    planned.extend(order_table_creates(create_tables));
    planned.extend(drop_foreign_keys);
    planned.extend(drop_columns);
    planned.extend(add_columns);
    planned.extend(alter_columns);
    planned.extend(add_foreign_keys);
    planned.extend(order_table_drops(drop_tables, live));
    planned
}

fn order_table_creates(changes: Vec<SchemaChange>) -> Vec<SchemaChange> {
    let mut dependencies = BTreeMap::new();
    for change in &changes {
        if let SchemaChange::CreateTable(table) = change {
            let deps: BTreeSet<String> = table.referenced_tables().map(str::to_string).collect();
            dependencies.insert(table.name.clone(), deps);
        }
    }
    order_by(changes, &dependencies)
}

/// Referencing tables are dropped before the tables they reference.
fn order_table_drops(changes: Vec<SchemaChange>, live: &Schema) -> Vec<SchemaChange> {
    let mut dependencies = BTreeMap::new();
    for change in &changes {
        if let SchemaChange::DropTable(name) = change {
            let deps: BTreeSet<String> = live
                .get(name)
                .map(|t| t.referenced_tables().map(str::to_string).collect())
                .unwrap_or_default();
            dependencies.insert(name.clone(), deps);
        }
    }
    let mut ordered = order_by(changes, &dependencies);
    ordered.reverse();
    ordered
}

fn order_by(
    changes: Vec<SchemaChange>,
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<SchemaChange> {
    let order = topological_sort(dependencies);
    let mut by_table: BTreeMap<String, SchemaChange> = changes
        .into_iter()
        .map(|c| (c.table().to_string(), c))
        .collect();
    order
        .into_iter()
        .filter_map(|name| by_table.remove(&name))
        .collect()
}

/// Kahn's algorithm over table names, dependencies first.
///
/// Dependencies outside the set are ignored. Names caught in a cycle are
/// appended in name order after everything that could be sorted.
fn topological_sort(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (table, deps) in dependencies {
        let known: Vec<&str> = deps
            .iter()
            .map(String::as_str)
            .filter(|d| dependencies.contains_key(*d))
            .collect();
        in_degree.insert(table.as_str(), known.len());
        for dep in known {
            dependents.entry(dep).or_default().push(table.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(dependencies.len());
    while let Some(name) = queue.pop_front() {
        sorted.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(count) = in_degree.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    let cyclic: Vec<String> = dependencies
        .keys()
        .filter(|name| !sorted.contains(name))
        .cloned()
        .collect();
    sorted.extend(cyclic);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDescriptor, ForeignKeyDescriptor, SemanticType, TableSchema};

    fn make_table(name: &str, references: &[&str]) -> TableSchema {
        let mut table = TableSchema::new(name)
            .with_column(ColumnDescriptor::new("Id", SemanticType::Int32).primary_key());
        for referenced in references {
            let column = format!("{referenced}Id");
            table = table
                .with_column(ColumnDescriptor::new(&column, SemanticType::Int32))
                .with_foreign_key(ForeignKeyDescriptor::new(name, column, *referenced, "Id"));
        }
        table
    }

    fn table_order(changes: &[SchemaChange]) -> Vec<&str> {
        changes.iter().map(|c| c.table()).collect()
    }

    #[test]
    fn create_tables_ordered_by_fk_dependencies() {
        let ops = vec![
            SchemaChange::CreateTable(make_table("Comment", &["Post", "User"])),
            SchemaChange::CreateTable(make_table("Post", &["User"])),
            SchemaChange::CreateTable(make_table("User", &[])),
        ];

        let planned = plan_changes(ops, &Schema::new());
        assert_eq!(table_order(&planned), vec!["User", "Post", "Comment"]);
    }

    #[test]
    fn self_reference_does_not_block_ordering() {
        let ops = vec![SchemaChange::CreateTable(make_table("Employee", &["Employee"]))];
        let planned = plan_changes(ops, &Schema::new());
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn cyclic_creates_are_all_kept() {
        let ops = vec![
            SchemaChange::CreateTable(make_table("A", &["B"])),
            SchemaChange::CreateTable(make_table("B", &["A"])),
            SchemaChange::CreateTable(make_table("C", &[])),
        ];
        let planned = plan_changes(ops, &Schema::new());
        assert_eq!(table_order(&planned), vec!["C", "A", "B"]);
    }

    #[test]
    fn phases_follow_fixed_order() {
        let ops = vec![
            SchemaChange::DropTable("Legacy".to_string()),
            SchemaChange::AddForeignKey {
                table: "Person".to_string(),
                foreign_key: ForeignKeyDescriptor::new("Person", "AddressId", "Address", "Id"),
            },
            SchemaChange::AlterColumn {
                table: "Person".to_string(),
                column: "Name".to_string(),
                semantic_type: SemanticType::String,
                nullable: false,
            },
            SchemaChange::AddColumn {
                table: "Person".to_string(),
                column: ColumnDescriptor::new("AddressId", SemanticType::Int32),
            },
            SchemaChange::DropColumn {
                table: "Person".to_string(),
                column: "OldAddressId".to_string(),
            },
            SchemaChange::DropForeignKey {
                table: "Person".to_string(),
                constraint: "FK_Person_OldAddressId".to_string(),
            },
            SchemaChange::CreateTable(make_table("Address", &[])),
        ];

        let planned = plan_changes(ops, &Schema::new());
        let kinds: Vec<&str> = planned
            .iter()
            .map(|c| match c {
                SchemaChange::CreateTable(_) => "create_table",
                SchemaChange::DropForeignKey { .. } => "drop_fk",
                SchemaChange::DropColumn { .. } => "drop_column",
                SchemaChange::AddColumn { .. } => "add_column",
                SchemaChange::AlterColumn { .. } => "alter_column",
                SchemaChange::AddForeignKey { .. } => "add_fk",
                SchemaChange::DropTable(_) => "drop_table",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "create_table",
                "drop_fk",
                "drop_column",
                "add_column",
                "alter_column",
                "add_fk",
                "drop_table"
            ]
        );
    }

    #[test]
    fn drop_tables_referencing_first() {
        let live = Schema::new()
            .with_table(make_table("User", &[]))
            .with_table(make_table("Post", &["User"]))
            .with_table(make_table("Comment", &["Post"]));
        let ops = vec![
            SchemaChange::DropTable("User".to_string()),
            SchemaChange::DropTable("Comment".to_string()),
            SchemaChange::DropTable("Post".to_string()),
        ];

        let planned = plan_changes(ops, &live);
        assert_eq!(table_order(&planned), vec!["Comment", "Post", "User"]);
    }

    #[test]
    fn empty_changes_return_empty() {
        assert!(plan_changes(Vec::new(), &Schema::new()).is_empty());
    }
}
