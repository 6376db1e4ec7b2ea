fn main() {
    // Tell the linker where to find memory.x
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let memory_x = std::fs::read("memory.x").expect("failed to read memory.x");
    std::fs::write(format!("{out_dir}/memory.x"), memory_x).unwrap();
    println!("cargo:rustc-link-search={out_dir}");
    println!("cargo:rerun-if-changed=memory.x");
}
