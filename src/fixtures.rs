//! Theme directories for tests.

use std::fs;
use std::path::{Path, PathBuf};

fn write(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Standalone theme with every kind of source
pub fn base_theme(root: &Path) -> PathBuf {
    let dir = root.join("base");
    write(&dir, "robots.txt", "User-agent: *\n");
    write(&dir, "assets/asset.txt", "asset\n");
    write(
        &dir,
        "scss/index.scss",
        "@import \"variables\";\nbody { color: $text-color; }\n",
    );
    write(&dir, "scss/_variables.scss", "$text-color: #333;\n");
    write(
        &dir,
        "js/index.js",
        "var message = require('./message');\nvar config = require('./config.json');\nconsole.log(message, config.name);\n",
    );
    write(&dir, "js/message.js", "module.exports = 'hello';\n");
    write(&dir, "js/config.json", "{ \"name\": \"base\" }\n");
    write(
        &dir,
        "templates/default.html",
        "<html><body>{{ body }}</body></html>\n",
    );
    write(
        &dir,
        "templates/alternate.html",
        "<html><body>Puppies</body></html>\n",
    );
    write(&dir, "templates/nope.html", "<html>{% if %}</html>\n");
    dir
}

/// Root theme meant to be inherited
pub fn parent_theme(root: &Path) -> PathBuf {
    let dir = root.join("parent");
    write(&dir, "robots.txt", "User-agent: parent\n");
    write(&dir, "assets/parent.txt", "from parent\n");
    write(
        &dir,
        "scss/index.scss",
        "@import \"colors\";\n.parent { color: $brand; }\n",
    );
    write(&dir, "scss/_colors.scss", "$brand: #ff6600;\n");
    write(&dir, "js/index.js", "require('./greet');\n");
    write(
        &dir,
        "js/greet.js",
        "module.exports = function () { return 'from parent'; };\n",
    );
    write(
        &dir,
        "templates/default.html",
        "<html><body>parent: {{ body }}</body></html>\n",
    );
    write(
        &dir,
        "templates/parent-only.html",
        "<main>Inherited {{ body }}</main>\n",
    );
    dir
}

/// Theme that imports its parent's stylesheet and script trees by alias
pub fn child_theme(root: &Path) -> PathBuf {
    let dir = root.join("child");
    write(&dir, "robots.txt", "User-agent: child\n");
    write(
        &dir,
        "scss/index.scss",
        "@import \"parent\";\n.child { color: $brand; }\n",
    );
    write(
        &dir,
        "js/index.js",
        "var greet = require('parent/js/greet');\nconsole.log(greet());\n",
    );
    write(
        &dir,
        "templates/default.html",
        "<html><body>child: {{ body }}</body></html>\n",
    );
    dir
}
