use packsmith::{
    app::Session,
    config::{AppConfig, GameConfig},
    game::GameId,
    order::ActiveOrderStore,
    script,
    standard::StandardRegistry,
};
use pretty_assertions::assert_eq;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

struct GameDir {
    _root: TempDir,
    game_root: PathBuf,
    content_dir: PathBuf,
    script_path: PathBuf,
    data_dir: PathBuf,
}

impl GameDir {
    fn new(packs: &[&str]) -> Self {
        let root = TempDir::new().expect("temp dir");
        let game_root = root.path().join("game");
        let content_dir = game_root.join("data");
        fs::create_dir_all(&content_dir).unwrap();
        for pack in packs {
            fs::write(content_dir.join(pack), b"").unwrap();
        }
        Self {
            content_dir,
            script_path: root.path().join("appdata").join("user.script.txt"),
            data_dir: root.path().join("manager"),
            game_root,
            _root: root,
        }
    }

    fn write_script(&self, raw: &str) {
        fs::create_dir_all(self.script_path.parent().unwrap()).unwrap();
        fs::write(&self.script_path, raw).unwrap();
    }

    fn write_standard_list(&self, raw: &str) {
        fs::create_dir_all(&self.data_dir).unwrap();
        fs::write(self.data_dir.join("standard_packs.txt"), raw).unwrap();
    }

    fn script(&self) -> String {
        fs::read_to_string(&self.script_path).unwrap_or_default()
    }

    fn open(&self) -> Session {
        let config = GameConfig {
            game_id: GameId::Warhammer2,
            game_name: GameId::Warhammer2.display_name().to_string(),
            data_dir: self.data_dir.clone(),
            game_root: self.game_root.clone(),
            script_path: self.script_path.clone(),
            standard_list: None,
        };
        let app_config = AppConfig {
            active_game: GameId::Warhammer2,
            confirm_mod_delete: true,
        };
        Session::open(app_config, config).expect("open session")
    }
}

fn ids(session: &Session) -> Vec<&str> {
    session.order.ids().iter().map(String::as_str).collect()
}

#[test]
fn activate_save_deactivate_save() {
    let game = GameDir::new(&["a.pack", "b.pack"]);
    let mut session = game.open();
    assert!(session.order.is_empty());

    session.activate("a.pack").unwrap();
    session.activate("b.pack").unwrap();
    assert_eq!(ids(&session), vec!["a.pack", "b.pack"]);

    session.save().unwrap();
    assert_eq!(game.script(), "mod \"a.pack\";\nmod \"b.pack\";\n");

    session.deactivate("a.pack").unwrap();
    assert_eq!(ids(&session), vec!["b.pack"]);

    session.save().unwrap();
    assert_eq!(game.script(), "mod \"b.pack\";\n");
}

#[test]
fn first_run_bootstraps_from_script() {
    let game = GameDir::new(&["x.pack", "std.pack"]);
    game.write_standard_list("std.pack\n");
    game.write_script("mod \"x.pack\";\nmod \"std.pack\";\n");

    let session = game.open();

    assert_eq!(ids(&session), vec!["x.pack"]);
    assert_eq!(
        fs::read_to_string(game.data_dir.join("active_order.txt")).unwrap(),
        "x.pack\n"
    );
    let listed: Vec<&str> = session.packages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(listed, vec!["x.pack"]);
}

#[test]
fn save_keeps_foreign_and_standard_lines() {
    let game = GameDir::new(&["mine.pack", "std.pack"]);
    game.write_standard_list("std.pack\n");
    game.write_script("# user comment\r\nmod \"std.pack\";\r\nmod \"mine.pack\";\r\n");
    let mut session = game.open();
    assert_eq!(ids(&session), vec!["mine.pack"]);

    session.deactivate("mine.pack").unwrap();
    session.save().unwrap();

    assert_eq!(game.script(), "# user comment\r\nmod \"std.pack\";\r\n");
}

#[test]
fn missing_packages_are_pruned_on_open() {
    let game = GameDir::new(&["a.pack", "b.pack"]);
    let mut session = game.open();
    session.activate("a.pack").unwrap();
    session.activate("b.pack").unwrap();
    drop(session);

    fs::remove_file(game.content_dir.join("a.pack")).unwrap();
    let session = game.open();

    assert_eq!(ids(&session), vec!["b.pack"]);
    assert_eq!(
        fs::read_to_string(game.data_dir.join("active_order.txt")).unwrap(),
        "b.pack\n"
    );
}

#[test]
fn install_leaves_new_packages_inactive() {
    let game = GameDir::new(&[]);
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("new.pack");
    fs::write(&source, b"payload").unwrap();
    let mut session = game.open();

    let reports = session.install(&[source]).unwrap();

    assert_eq!(reports[0].1.installed, vec!["new.pack".to_string()]);
    assert_eq!(session.packages.len(), 1);
    assert!(session.order.is_empty());
    assert!(session.statuses().iter().all(|status| !status.active));
}

#[test]
fn store_read_is_stable_after_pruning() {
    let dir = TempDir::new().unwrap();
    let store = ActiveOrderStore::in_dir(dir.path());
    fs::write(store.path(), "a.pack\nold.pack\n").unwrap();
    let installed: HashSet<String> = ["a.pack".to_string()].into_iter().collect();
    let registry = StandardRegistry::default();

    let first = store.read(&[], &registry, &installed).unwrap();
    let on_disk = fs::read_to_string(store.path()).unwrap();
    let second = store.read(&[], &registry, &installed).unwrap();

    assert_eq!(first, second);
    assert_eq!(on_disk, "a.pack\n");
}

#[test]
fn reconcile_twice_is_byte_identical() {
    let registry: StandardRegistry = ["std.pack"].into_iter().collect();
    let existing = script::ScriptFile::parse(
        "// header\nmod \"std.pack\";\nmod \"gone.pack\";\nmod \"b.pack\";\n",
    );
    let order = ["a.pack", "b.pack"];

    let first = existing.with_lines(script::reconcile(&existing.lines, &order, &registry));
    let second = first.with_lines(script::reconcile(&first.lines, &order, &registry));

    assert_eq!(first.render(), second.render());
    assert_eq!(
        first.render(),
        "// header\nmod \"std.pack\";\nmod \"a.pack\";\nmod \"b.pack\";\n"
    );
}

#[test]
fn unset_game_root_keeps_stored_order() {
    let root = TempDir::new().unwrap();
    let data_dir = root.path().join("manager");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("active_order.txt"), "kept.pack\n").unwrap();
    let config = GameConfig {
        game_id: GameId::Warhammer2,
        game_name: "test".to_string(),
        data_dir: data_dir.clone(),
        game_root: root.path().join("no-such-game"),
        script_path: root.path().join("user.script.txt"),
        standard_list: None,
    };
    let app_config = AppConfig {
        active_game: GameId::Warhammer2,
        confirm_mod_delete: true,
    };

    let mut session = Session::open(app_config, config).unwrap();

    assert!(session.paths.is_none());
    assert_eq!(ids(&session), vec!["kept.pack"]);
    assert!(session.save().is_err());
    assert!(!Path::new(&root.path().join("user.script.txt")).exists());
}

#[test]
fn restore_undoes_first_save() {
    let game = GameDir::new(&["a.pack"]);
    let mut session = game.open();
    session.activate("a.pack").unwrap();
    session.save().unwrap();
    assert_eq!(game.script(), "mod \"a.pack\";\n");

    session.restore_last_backup().unwrap();

    assert!(!game.script_path.exists());
    assert_eq!(ids(&session), vec!["a.pack"]);
}
