pub fn main() -> ! {
    codicil_apply_patch::main()
}
