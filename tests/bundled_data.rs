use geoportal::config::{DataConfig, MapConfig};
use geoportal::data::load_store;
use geoportal::layers::{LayerId, LayerRegistry};
use geoportal::render::{render, MapContext};
use geoportal::style::StyleBook;
use geoportal::visibility::VisibilityState;
use pretty_assertions::assert_eq;
use std::path::Path;

fn bundled() -> DataConfig {
    DataConfig {
        layer_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("data/layers"),
        points: None,
    }
}

#[test]
fn bundled_layers_pass_style_validation() {
    let store = load_store(&bundled()).unwrap();
    assert_eq!(StyleBook::builtin().validate(&store), Ok(()));
    assert_eq!(store.loaded_layers().count(), LayerId::ALL.len() - 1);
    assert!(store.collection(LayerId::SatelliteImagery).is_none());
}

#[test]
fn every_layer_switched_on_renders() {
    let store = load_store(&bundled()).unwrap();
    let registry = LayerRegistry::builtin();
    let styles = StyleBook::builtin();
    let map = MapConfig::default();
    let ctx = MapContext {
        store: &store,
        registry: &registry,
        styles: &styles,
        map: &map,
    };

    let mut state = VisibilityState::hidden();
    for id in LayerId::ALL {
        state.set_visible(id, true);
    }
    let plan = render(&ctx, &state).unwrap();
    assert_eq!(plan.overlays.len(), LayerId::ALL.len() - 1);
    // point filters stay off: only public-facility and tourism markers
    assert_eq!(plan.markers.len(), 5);
}
