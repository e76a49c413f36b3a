use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

use kls_project::{ModuleRef, ModuleSettings, ProjectModule, Workspace};
use kls_service::{AnalysisService, AnalysisServiceRegistry, ServiceConfig};
use tempfile::tempdir;
use zip::write::FileOptions;
use zip::ZipWriter;

const THREADS: usize = 50;

fn write_jar(path: &Path, entries: &[&str]) -> PathBuf {
    let file = File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for entry in entries {
        writer
            .start_file(*entry, FileOptions::default())
            .expect("start jar entry");
        writer.write_all(b"\xCA\xFE\xBA\xBE").expect("write jar entry");
    }
    writer.finish().expect("finish jar");
    path.to_path_buf()
}

fn platform_module(dir: &Path, name: &str) -> Arc<ProjectModule> {
    let android = write_jar(&dir.join("android.jar"), &["android/app/Activity.class"]);
    let core = write_jar(&dir.join("core.jar"), &["androidx/core/app/ActivityCompat.class"]);
    Arc::new(ProjectModule::new(
        name,
        dir.join(name),
        ModuleSettings::platform([android]).with_compile_classpaths([core]),
    ))
}

#[test]
fn simultaneous_first_requests_share_one_service() {
    let dir = tempdir().expect("temp dir");
    let module: ModuleRef = platform_module(dir.path(), "app");
    let registry = AnalysisServiceRegistry::new(&ServiceConfig::default());
    let barrier = Barrier::new(THREADS);

    let services: Vec<Arc<AnalysisService>> = thread::scope(|scope| {
        let (registry, barrier, module) = (&registry, &barrier, &module);
        let handles = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    registry.get(Some(module)).expect("service")
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread"))
            .collect()
    });

    let first = &services[0];
    assert!(services.iter().all(|service| Arc::ptr_eq(service, first)));
    assert!(!first.is_destroyed());
    assert!(first.is_live());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.file_contexts().len(), 1);
}

#[test]
fn modules_requested_concurrently_stay_independent() {
    let dir = tempdir().expect("temp dir");
    let modules: Vec<ModuleRef> = (0..8)
        .map(|index| platform_module(dir.path(), &format!("feature-{index}")) as ModuleRef)
        .collect();
    let registry = AnalysisServiceRegistry::new(&ServiceConfig::default());
    let barrier = Barrier::new(modules.len() * 4);

    thread::scope(|scope| {
        for module in &modules {
            for _ in 0..4 {
                let (registry, barrier) = (&registry, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    registry.get(Some(module)).expect("service");
                });
            }
        }
    });

    assert_eq!(registry.len(), modules.len());
    for module in &modules {
        let service = registry.get(Some(module)).expect("service");
        assert!(Arc::ptr_eq(service.module().expect("module"), module));
    }
}

#[test]
fn teardown_racing_lookups_keeps_class_sets_readable() {
    let dir = tempdir().expect("temp dir");
    let module: ModuleRef = platform_module(dir.path(), "app");
    let registry = AnalysisServiceRegistry::new(&ServiceConfig::default());
    let barrier = Barrier::new(THREADS + 1);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..20 {
                    let service = registry.get(Some(&module)).expect("service");
                    // The returned service may be torn down afterwards, but its
                    // class sets stay readable.
                    assert!(service.is_class_available("android.app.Activity"));
                }
            });
        }
        scope.spawn(|| {
            barrier.wait();
            for _ in 0..20 {
                registry.destroy_all();
                thread::yield_now();
            }
        });
    });

    let survivor = registry.get(Some(&module)).expect("service");
    assert!(survivor.is_live());
    assert!(!survivor.is_destroyed());
    assert!(Arc::ptr_eq(
        &survivor,
        &registry.get(Some(&module)).expect("service")
    ));
}

#[test]
fn removing_a_module_while_its_service_is_in_use() {
    let dir = tempdir().expect("temp dir");
    let android = write_jar(&dir.path().join("android.jar"), &["android/app/Activity.class"]);
    let workspace = Workspace::new(dir.path());
    let module: ModuleRef = workspace.add_module("app", ModuleSettings::platform([android]));
    let registry = AnalysisServiceRegistry::new(&ServiceConfig::default());
    let held = registry.get(Some(&module)).expect("service");
    let barrier = Barrier::new(THREADS + 1);

    let reacquired: Vec<Arc<AnalysisService>> = thread::scope(|scope| {
        let (registry, barrier, module, held) = (&registry, &barrier, &module, &held);
        let readers = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    for _ in 0..20 {
                        assert!(held.is_class_available("android.app.Activity"));
                    }
                    registry.get(Some(module)).expect("service")
                })
            })
            .collect::<Vec<_>>();
        barrier.wait();
        workspace.remove_module("app").expect("removed module");
        readers
            .into_iter()
            .map(|reader| reader.join().expect("worker thread"))
            .collect()
    });

    assert!(!module.is_live());
    assert!(!held.is_live());
    assert!(held.is_class_available("android.app.Activity"));
    for service in &reacquired {
        assert!(service.is_class_available("android.app.Activity"));
    }

    let after_removal = registry.get(Some(&module)).expect("service");
    assert!(!Arc::ptr_eq(&held, &after_removal));
    assert!(!after_removal.is_live());
    assert!(held.is_destroyed());
    assert!(registry.is_empty());
}
