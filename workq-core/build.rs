fn main() {
    // `links = "workq-core"` in the manifest ensures at most one copy of the
    // pool machinery is linked into a build; the script itself has no work.
    println!("cargo:rerun-if-changed=build.rs");
}
