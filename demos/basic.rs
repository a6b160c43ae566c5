use sievetree::*;

fn main() -> Result<(), FilterError> {
    // 1. Describe the filterable fields of the domain
    let age = FilterableField::new("person.age", FieldKind::Int).with_name("Age");
    let diet = FilterableField::new("person.diet", FieldKind::Text { large: false })
        .with_name("Dietary preference");

    // 2. Map them onto the storage model
    let resolver = MapResolver::builder()
        .path(&age, "person.age")
        .path(&diet, "person.diet")
        .build();

    // 3. Build a filter tree: age > 25 AND diet contains "vegan"
    let mut tree = FilterTree::new();
    let age_filter = tree.comparing(age);
    tree.set_comparison(age_filter, Comparison::GreaterThan)?;
    tree.provide_value(age_filter, FieldValue::Int(25));
    let diet_filter = tree.containment(diet);
    tree.provide_value(diet_filter, FieldValue::from("vegan"));
    let root = tree.and(age_filter, diet_filter)?;
    println!("Filter tree: {}", tree.display(root));

    // 4. Compile it into a query for the storage layer
    let query = PredicateCompiler::compile(&resolver, "person", &tree, root)?;
    println!("Compiled query: {}", query);

    Ok(())
}
