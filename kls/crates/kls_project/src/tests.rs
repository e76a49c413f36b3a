use super::*;
use std::path::PathBuf;
use std::sync::Arc;

fn jar(name: &str) -> PathBuf {
    PathBuf::from("/libs").join(name)
}

#[test]
fn module_keys_follow_object_identity() {
    let settings = ModuleSettings::plain().with_compile_classpaths([jar("a.jar")]);
    let first: ModuleRef = Arc::new(ProjectModule::new("app", "/ws/app", settings.clone()));
    let second: ModuleRef = Arc::new(ProjectModule::new("app", "/ws/app", settings));

    assert_eq!(ModuleKey::of(&first), ModuleKey::of(&Arc::clone(&first)));
    assert_ne!(ModuleKey::of(&first), ModuleKey::of(&second));
}

#[test]
fn concrete_and_trait_handles_share_a_key() {
    let module = Arc::new(ProjectModule::new("app", "/ws/app", ModuleSettings::plain()));
    let as_ref: ModuleRef = module.clone();
    assert_eq!(ModuleKey::of(&module), ModuleKey::of(&as_ref));
}

#[test]
fn reconfigure_bumps_generation_and_replaces_classpath() {
    let module = ProjectModule::new(
        "app",
        "/ws/app",
        ModuleSettings::plain().with_compile_classpaths([jar("old.jar")]),
    );
    assert_eq!(module.generation(), 0);

    module.reconfigure(ModuleSettings::plain().with_compile_classpaths([jar("new.jar")]));

    assert_eq!(module.generation(), 1);
    assert_eq!(module.compile_classpaths().unwrap(), vec![jar("new.jar")]);
    assert!(module.is_live());
}

#[test]
fn platform_settings_carry_boot_entries() {
    let module = ProjectModule::new(
        "app",
        "/ws/app",
        ModuleSettings::platform([jar("android.jar")]).with_source_classes(["com.app.Main"]),
    );
    assert_eq!(module.kind(), ModuleKind::Platform);
    assert_eq!(module.boot_classpaths().unwrap(), vec![jar("android.jar")]);
    assert!(module.source_classes().unwrap().contains("com.app.Main"));
}

#[test]
fn workspace_replace_detaches_previous_module() {
    let workspace = Workspace::new("/ws");
    let original = workspace.add_module("app", ModuleSettings::plain());
    assert_eq!(original.path(), std::path::Path::new("/ws/app"));

    let replacement = workspace
        .replace_module("app", ModuleSettings::plain().with_compile_classpaths([jar("b.jar")]))
        .expect("replace module");

    assert!(!original.is_live());
    assert!(replacement.is_live());
    assert!(Arc::ptr_eq(
        &workspace.module("app").expect("module registered"),
        &replacement
    ));
}

#[test]
fn workspace_replace_unknown_module_fails() {
    let workspace = Workspace::new("/ws");
    let error = workspace
        .replace_module("missing", ModuleSettings::plain())
        .expect_err("unknown module should be rejected");
    assert!(matches!(error, ModelError::Unavailable { .. }));
}

#[test]
fn workspace_remove_and_close_detach_modules() {
    let workspace = Workspace::new("/ws");
    let app = workspace.add_module("app", ModuleSettings::plain());
    let lib = workspace.add_module("lib", ModuleSettings::plain());

    let removed = workspace.remove_module("app").expect("app removed");
    assert!(Arc::ptr_eq(&removed, &app));
    assert!(!app.is_live());
    assert!(lib.is_live());

    workspace.close();
    assert!(!lib.is_live());
    assert!(workspace.modules().is_empty());
}
