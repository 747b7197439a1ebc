use env_logger::Env;
use sapling::{
    DragEvent, DragResponse, DropGeometry, DropSite, FieldAccessor,
    FieldNames, Hooks, ItemId, Record, TreeCollection, TreeEngine,
    TreeOptions,
};
use serde_json::json;

const ROW_HEIGHT: f32 = 24.0;

fn print_rows(engine: &TreeEngine<Record>) {
    for row in engine.visible_rows() {
        let marker = match (row.has_children, row.expanded) {
            (false, _) => ' ',
            (true, true) => 'v',
            (true, false) => '>',
        };
        let name = engine.fields().name(&row.item);
        println!("{}{marker} {name}", "  ".repeat(row.depth));
    }
    println!();
}

fn site_of(engine: &TreeEngine<Record>, id: &ItemId, offset: f32) -> DropSite {
    let row = engine
        .visible_rows()
        .iter()
        .position(|row| row.id == *id)
        .unwrap_or_default();
    let top = row as f32 * ROW_HEIGHT;
    let geometry = DropGeometry::new(top, ROW_HEIGHT, top + offset);
    DropSite::item(id.element_id(), geometry)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(
        Env::default().default_filter_or("sapling=debug"),
    )
    .format_timestamp_millis()
    .init();

    let items: Vec<Record> = serde_json::from_value(json!([
        {"id": 1, "name": "Projects"},
        {"id": 2, "parentId": 1, "name": "sapling"},
        {"id": 3, "parentId": 1, "name": "notes"},
        {"id": 4, "name": "Archive"},
        {"id": 5, "parentId": 4, "name": "locked"},
    ]))?;
    let locked = ItemId::Num(5);

    let fields = FieldAccessor::from_names(&FieldNames::default());
    let hooks = Hooks::<Record>::new().on_before_update({
        let locked = locked.clone();
        move |ctx| {
            let allowed = fields.id(&ctx.item).as_ref() != Some(&locked);
            async move { allowed }
        }
    });
    let options = TreeOptions::from_json(
        r#"{"maxDepth": 3, "logging": true, "editable": {"canCreate": true}}"#,
    )?
    .with_hooks(hooks);
    let engine = TreeEngine::new(TreeCollection::new(items), options)?;

    engine.force_open(&ItemId::Num(1));
    engine.force_open(&ItemId::Num(4));
    print_rows(&engine);

    engine.create(Some(ItemId::Num(2))).await;
    print_rows(&engine);

    let source = ItemId::Num(3);
    let target = ItemId::Num(4);
    engine
        .drag(DragEvent::Start {
            element_id: source.element_id(),
        })
        .await;
    let middle = ROW_HEIGHT / 2.0;
    if let DragResponse::Hover(hover) = engine
        .drag(DragEvent::Over {
            site: site_of(&engine, &target, middle),
        })
        .await
    {
        println!("hover over {target}: {:?}", hover.target.location());
    }
    let response = engine
        .drag(DragEvent::Drop {
            site: site_of(&engine, &target, middle),
        })
        .await;
    println!("drop: {response:?}\n");
    print_rows(&engine);

    engine.drag_start(&locked.element_id())?;
    let response = engine.drop_on(site_of(&engine, &source, 1.0)).await;
    println!("drop of {locked}: {response:?}\n");

    let nested = serde_json::to_string_pretty(&engine.nested())?;
    println!("{nested}");
    Ok(())
}
