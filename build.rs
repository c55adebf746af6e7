//! 扫描 migrations/*.sql，生成 `MIGRATIONS` 常量供 `infra::migrate` 使用

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("cargo 未设置 OUT_DIR"));
    let dir = Path::new("migrations");
    println!("cargo:rerun-if-changed=migrations");

    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".sql"))
            .collect(),
        Err(_) => Vec::new(),
    };
    // 文件名前缀即执行顺序
    names.sort();

    let mut generated = String::from("/// 按文件名顺序排列的 (迁移名, SQL)\npub const MIGRATIONS: &[(&str, &str)] = &[\n");
    for file in &names {
        println!("cargo:rerun-if-changed=migrations/{}", file);
        generated.push_str(&format!(
            "    ({:?}, include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/migrations/{}\"))),\n",
            file.trim_end_matches(".sql"),
            file
        ));
    }
    generated.push_str("];\n");

    fs::write(out.join("migrations.rs"), generated).expect("无法写入 migrations.rs");
}
