use image::RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Frame,
    Object,
    Embed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSurface {
    pub page_number: u32,
    pub image: RgbaImage,
}

impl RenderSurface {
    pub fn width_px(&self) -> u32 {
        self.image.width()
    }

    pub fn height_px(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Placeholder(String),
    Surface(RenderSurface),
    Image { source_url: String },
    Text(String),
    Embedded(EmbedKind),
}

/// Redundant visibility channels. A concealed node sets every channel at
/// once; partial application of any single channel must still hide the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HideState {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub opacity: f32,
    pub collapsed: bool,
}

impl Default for HideState {
    fn default() -> Self {
        Self { display_none: false, visibility_hidden: false, opacity: 1.0, collapsed: false }
    }
}

impl HideState {
    pub fn conceal_all_channels(&mut self) {
        self.display_none = true;
        self.visibility_hidden = true;
        self.opacity = 0.0;
        self.collapsed = true;
    }

    pub fn is_concealed(&self) -> bool {
        self.display_none || self.visibility_hidden || self.opacity == 0.0 || self.collapsed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    content: NodeContent,
    hide: HideState,
    children: Vec<Node>,
}

impl Node {
    fn new(id: NodeId, content: NodeContent) -> Self {
        Self { id, content, hide: HideState::default(), children: Vec::new() }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn hide_state(&self) -> HideState {
        self.hide
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn own_text(&self) -> Option<&str> {
        match &self.content {
            NodeContent::Placeholder(text) | NodeContent::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text of this node plus all descendants, document order.
    pub fn subtree_text(&self) -> String {
        let mut fragments = Vec::new();
        self.collect_text(&mut fragments);
        fragments.join(" ")
    }

    fn collect_text<'a>(&'a self, fragments: &mut Vec<&'a str>) {
        if let Some(text) = self.own_text() {
            fragments.push(text);
        }
        for child in &self.children {
            child.collect_text(fragments);
        }
    }

    /// All descendants in document order, excluding this node.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut nodes = Vec::new();
        for child in &self.children {
            child.collect_nodes(&mut nodes);
        }
        nodes
    }

    fn collect_nodes<'a>(&'a self, nodes: &mut Vec<&'a Node>) {
        nodes.push(self);
        for child in &self.children {
            child.collect_nodes(nodes);
        }
    }

    fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    fn remove_descendant(&mut self, id: NodeId) -> bool {
        if let Some(index) = self.children.iter().position(|child| child.id == id) {
            self.children.remove(index);
            return true;
        }
        self.children.iter_mut().any(|child| child.remove_descendant(id))
    }
}

/// Display container for one viewer session: the render container (`content`)
/// and the surrounding modal chrome as sibling roots. Every mutation bumps
/// `revision`, which is the subtree-change signal the scrub watch observes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerTree {
    revision: u64,
    next_id: u64,
    content: Node,
    chrome: Node,
}

impl Default for ViewerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerTree {
    pub fn new() -> Self {
        Self {
            revision: 0,
            next_id: 3,
            content: Node::new(NodeId(1), NodeContent::Text(String::new())),
            chrome: Node::new(NodeId(2), NodeContent::Text(String::new())),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn content(&self) -> &Node {
        &self.content
    }

    pub fn chrome(&self) -> &Node {
        &self.chrome
    }

    pub fn content_id(&self) -> NodeId {
        self.content.id
    }

    pub fn chrome_id(&self) -> NodeId {
        self.chrome.id
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn append_content(&mut self, content: NodeContent) -> NodeId {
        let parent = self.content_id();
        self.append_child(parent, content).expect("content root always exists")
    }

    pub fn append_chrome(&mut self, content: NodeContent) -> NodeId {
        let parent = self.chrome_id();
        self.append_child(parent, content).expect("chrome root always exists")
    }

    pub fn append_child(&mut self, parent: NodeId, content: NodeContent) -> Option<NodeId> {
        let id = self.allocate();
        let node = Node::new(id, content);

        let target = self
            .content
            .find_mut(parent)
            .or_else(|| self.chrome.find_mut(parent))?;

        target.children.push(node);
        self.revision += 1;
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.content.find(id).or_else(|| self.chrome.find(id))
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        let Some(node) = self.content.find_mut(id).or_else(|| self.chrome.find_mut(id)) else {
            return false;
        };

        match &mut node.content {
            NodeContent::Placeholder(existing) | NodeContent::Text(existing) => {
                *existing = text.into();
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    pub fn hide(&mut self, id: NodeId) -> bool {
        let Some(node) = self.content.find_mut(id).or_else(|| self.chrome.find_mut(id)) else {
            return false;
        };

        node.hide.conceal_all_channels();
        self.revision += 1;
        true
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.content.id || id == self.chrome.id {
            return false;
        }

        let removed =
            self.content.remove_descendant(id) || self.chrome.remove_descendant(id);
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn clear_content(&mut self) {
        if !self.content.children.is_empty() {
            self.content.children.clear();
            self.revision += 1;
        }
    }

    pub fn clear(&mut self) {
        let had_children =
            !self.content.children.is_empty() || !self.chrome.children.is_empty();

        self.content.children.clear();
        self.chrome.children.clear();

        if had_children {
            self.revision += 1;
        }
    }

    pub fn is_content_empty(&self) -> bool {
        self.content.children.is_empty()
    }

    pub fn surfaces(&self) -> Vec<&RenderSurface> {
        self.content
            .descendants()
            .into_iter()
            .filter_map(|node| match node.content() {
                NodeContent::Surface(surface) => Some(surface),
                _ => None,
            })
            .collect()
    }

    pub fn surface_page_numbers(&self) -> Vec<u32> {
        self.surfaces().into_iter().map(|surface| surface.page_number).collect()
    }

    pub fn surface_count(&self) -> usize {
        self.surface_page_numbers().len()
    }

    pub fn placeholder_texts(&self) -> Vec<&str> {
        self.content
            .descendants()
            .into_iter()
            .filter_map(|node| match node.content() {
                NodeContent::Placeholder(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains_embedded(&self) -> bool {
        self.content
            .descendants()
            .into_iter()
            .chain(self.chrome.descendants())
            .any(|node| matches!(node.content(), NodeContent::Embedded(_)))
    }
}
