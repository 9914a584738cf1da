fn main() {
    medibook_lib::run()
}
