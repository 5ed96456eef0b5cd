// Tests for module visibility, export chains, and graph construction

use chassis_core::{
    Error, ModuleContainer, ModuleDef, ProviderDef, ResolvedDeps, Token,
};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Db;

struct UserService {
    db: Arc<Db>,
}

fn db_module(export: bool) -> ModuleDef {
    let module = ModuleDef::new("Core").provider(ProviderDef::value(Db));
    if export {
        module.export::<Db>()
    } else {
        module
    }
}

#[test]
fn test_provider_visible_through_full_export_chain() {
    // C exports Db to B, and B re-exports C to A.
    let c = db_module(true);
    let b = ModuleDef::new("Bridge").import(c).export_module("Core");
    let a = ModuleDef::new("App").import(b);

    let container = ModuleContainer::scan(a).unwrap();
    let via_a = container.resolve::<Db>("App").unwrap();
    let via_c = container.resolve::<Db>("Core").unwrap();
    assert!(Arc::ptr_eq(&via_a, &via_c));
}

#[test]
fn test_visibility_stops_without_re_export() {
    // C exports Db to B, but B does not re-export C.
    let c = db_module(true);
    let b = ModuleDef::new("Bridge").import(c);
    let a = ModuleDef::new("App").import(b);

    let container = ModuleContainer::scan(a).unwrap();

    // B sees it, A does not.
    assert!(container.resolve::<Db>("Bridge").is_ok());
    let err = container.resolve::<Db>("App").unwrap_err();
    assert!(matches!(err, Error::UnknownProvider { module, .. } if module == "App"));
}

#[test]
fn test_unexported_provider_is_invisible_to_importer() {
    let c = db_module(false);
    let b = ModuleDef::new("Bridge").import(c);

    let container = ModuleContainer::scan(b).unwrap();
    let err = container.resolve::<Db>("Bridge").unwrap_err();
    assert!(matches!(err, Error::UnknownProvider { .. }));
}

#[test]
fn test_imported_singleton_is_shared_with_declaring_module() {
    // Core{providers:[Db], exports:[Db]}, Users{imports:[Core],
    // providers:[UserService(Db)]}.
    let core = db_module(true);
    let users = ModuleDef::new("Users").import(core).provider(
        ProviderDef::factory(|deps: ResolvedDeps<'_>| {
            Ok(UserService {
                db: deps.get::<Db>(0)?,
            })
        })
        .depends_on(Token::of::<Db>()),
    );

    let container = ModuleContainer::scan(users).unwrap();

    let service = container.resolve::<UserService>("Users").unwrap();
    let db = container.resolve::<Db>("Core").unwrap();
    assert!(Arc::ptr_eq(&service.db, &db));
}

#[test]
fn test_diamond_imports_share_one_registry() {
    let shared = Arc::new(db_module(true).export_all());
    let left = ModuleDef::new("Left").import(shared.clone()).export_module("Core");
    let right = ModuleDef::new("Right").import(shared).export_module("Core");
    let app = ModuleDef::new("App").import(left).import(right);

    let container = ModuleContainer::scan(app).unwrap();
    assert_eq!(container.module_count(), 4);

    let via_left_path = container.resolve::<Db>("Left").unwrap();
    let via_right_path = container.resolve::<Db>("Right").unwrap();
    let via_app = container.resolve::<Db>("App").unwrap();
    assert!(Arc::ptr_eq(&via_left_path, &via_right_path));
    assert!(Arc::ptr_eq(&via_left_path, &via_app));
}

#[test]
fn test_module_cycle_aborts_scan() {
    fn module_one() -> Arc<ModuleDef> {
        Arc::new(ModuleDef::new("One").import_deferred(module_two))
    }
    fn module_two() -> Arc<ModuleDef> {
        Arc::new(ModuleDef::new("Two").import_deferred(module_one))
    }

    let err = ModuleContainer::scan(module_one()).unwrap_err();
    match err {
        Error::ModuleCycle { path } => {
            assert!(path.contains(&"One".to_string()));
            assert!(path.contains(&"Two".to_string()));
        }
        other => panic!("expected module cycle, got {other:?}"),
    }
}

#[test]
fn test_first_declared_import_wins_on_shadowing() {
    let alpha = ModuleDef::new("Alpha")
        .provider(
            ProviderDef::value("alpha".to_string()).with_token(Token::named("CACHE")),
        )
        .export_token(Token::named("CACHE"));
    let beta = ModuleDef::new("Beta")
        .provider(
            ProviderDef::value("beta".to_string()).with_token(Token::named("CACHE")),
        )
        .export_token(Token::named("CACHE"));
    let app = ModuleDef::new("App").import(alpha).import(beta);

    let container = ModuleContainer::scan(app).unwrap();
    let cache = container
        .resolve_token(&Token::named("CACHE"), "App")
        .unwrap();
    assert_eq!(*cache.downcast::<String>().unwrap(), "alpha");
}

#[test]
fn test_own_provider_shadows_imports() {
    let alpha = ModuleDef::new("Alpha")
        .provider(
            ProviderDef::value("imported".to_string()).with_token(Token::named("CACHE")),
        )
        .export_token(Token::named("CACHE"));
    let app = ModuleDef::new("App").import(alpha).provider(
        ProviderDef::value("local".to_string()).with_token(Token::named("CACHE")),
    );

    let container = ModuleContainer::scan(app).unwrap();
    let cache = container
        .resolve_token(&Token::named("CACHE"), "App")
        .unwrap();
    assert_eq!(*cache.downcast::<String>().unwrap(), "local");
}

struct Settings {
    env: String,
}

#[test]
fn test_global_module_visible_without_import() {
    let config = ModuleDef::new("Config")
        .provider(ProviderDef::value(Settings {
            env: "test".to_string(),
        }))
        .export::<Settings>()
        .global();
    let feature = ModuleDef::new("Feature");
    let app = ModuleDef::new("App").import(config).import(feature);

    let container = ModuleContainer::scan(app).unwrap();

    // Feature never imports Config, yet resolves its exported provider.
    let settings = container.resolve::<Settings>("Feature").unwrap();
    assert_eq!(settings.env, "test");
}

#[test]
fn test_non_exported_global_provider_stays_hidden() {
    let config = ModuleDef::new("Config")
        .provider(ProviderDef::value(Settings {
            env: "test".to_string(),
        }))
        .global();
    let feature = ModuleDef::new("Feature");
    let app = ModuleDef::new("App").import(config).import(feature);

    let container = ModuleContainer::scan(app).unwrap();
    assert!(container.resolve::<Settings>("Feature").is_err());
}

#[test]
fn test_has_respects_visibility() {
    let core = db_module(true);
    let app = ModuleDef::new("App").import(core);
    let container = ModuleContainer::scan(app).unwrap();

    assert!(container.has(&Token::of::<Db>(), "App"));
    assert!(container.has(&Token::of::<Db>(), "Core"));
    assert!(!container.has(&Token::of::<UserService>(), "App"));
}

#[test]
fn test_lifecycle_hooks_run_in_graph_order() {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let core = {
        let events = events.clone();
        let destroy_events = events.clone();
        ModuleDef::new("Core")
            .on_init(move |_| {
                events.lock().unwrap().push("init:Core".to_string());
                Ok(())
            })
            .on_destroy(move |_| {
                destroy_events.lock().unwrap().push("destroy:Core".to_string());
                Ok(())
            })
    };
    let app = {
        let events = events.clone();
        let destroy_events = events.clone();
        ModuleDef::new("App")
            .import(core)
            .on_init(move |_| {
                events.lock().unwrap().push("init:App".to_string());
                Ok(())
            })
            .on_destroy(move |_| {
                destroy_events.lock().unwrap().push("destroy:App".to_string());
                Ok(())
            })
    };

    let container = ModuleContainer::scan(app).unwrap();
    container.shutdown().unwrap();

    let events = events.lock().unwrap();
    // Imports initialize first; destruction unwinds in reverse.
    assert_eq!(
        *events,
        vec!["init:Core", "init:App", "destroy:App", "destroy:Core"]
    );
}

#[test]
fn test_controllers_flatten_in_registration_order() {
    use chassis_core::{handler_fn, ControllerDef, RouteDef};
    use serde_json::json;

    let handler = handler_fn(|_args| async move { Ok(json!(null)) });
    let core = ModuleDef::new("Core")
        .controller(ControllerDef::new("Health", "/health").route(RouteDef::get(
            "check",
            "/",
            handler.clone(),
        )));
    let app = ModuleDef::new("App")
        .import(core)
        .controller(ControllerDef::new("Users", "/users").route(RouteDef::get(
            "list",
            "/",
            handler,
        )));

    let container = ModuleContainer::scan(app).unwrap();
    let controllers = container.controllers();
    let names: Vec<_> = controllers
        .iter()
        .map(|(module, c)| (*module, c.name.as_str()))
        .collect();
    assert_eq!(names, vec![("Core", "Health"), ("App", "Users")]);
}
